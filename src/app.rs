use tokio::io::{AsyncBufRead, Lines};
use tracing::{info, warn};

use crate::config::Settings;
use crate::credential_store::CredentialStore;
use crate::error::Error;
use crate::graph_api::{
    AuthClient, DeviceCodeFlow, MailApiClient, MicrosoftDeviceFlow, DEFAULT_PAGE_SIZE,
};
use crate::types::{MailMessage, MessagePage, OutboundMessage};

const DEFAULT_SUBJECT: &str = "Testing Microsoft Graph";
const DEFAULT_BODY: &str = "Hello world!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    DisplayToken,
    ListInbox,
    SendMail,
    ShowProfile,
    SaveToken,
    Invalid,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i32>() {
            Ok(0) => Self::Exit,
            Ok(1) => Self::DisplayToken,
            Ok(2) => Self::ListInbox,
            Ok(3) => Self::SendMail,
            Ok(4) => Self::ShowProfile,
            Ok(5) => Self::SaveToken,
            _ => Self::Invalid,
        }
    }
}

/// Builds the authenticated mail client from settings. No network traffic yet.
pub fn initialize_app(settings: &Settings) -> MailApiClient<MicrosoftDeviceFlow> {
    let http = reqwest::Client::new();
    let flow = MicrosoftDeviceFlow::new(
        http.clone(),
        &settings.authority_host,
        &settings.client_id,
        &settings.tenant_id,
    )
    .with_max_wait(settings.device_code_timeout());
    let auth = AuthClient::new(
        &settings.client_id,
        &settings.tenant_id,
        settings.scopes.clone(),
        flow,
    );
    MailApiClient::new(
        http,
        &settings.graph_base_url,
        settings.scopes.clone(),
        auth,
    )
}

/// Seeds the session from the store. Storage problems are reported and
/// the session carries on without a cached token.
pub fn load_cached_credentials<F: DeviceCodeFlow>(
    client: &mut MailApiClient<F>,
    store: &dyn CredentialStore,
) -> bool {
    match store.load() {
        Ok(Some(record)) => {
            client.auth_mut().restore_from_store(record);
            info!(location = %store.location(), "restored saved token");
            true
        }
        Ok(None) => {
            println!("No saved token at {}; you will be asked to sign in.", store.location());
            false
        }
        Err(e) => {
            warn!(error = %e, "ignoring saved token");
            println!("Could not use the saved token ({e}); you will be asked to sign in.");
            false
        }
    }
}

pub async fn greet_user<F: DeviceCodeFlow>(
    client: &mut MailApiClient<F>,
) -> Result<(), Error> {
    let user = client.get_profile().await?;
    println!("Hello, {}", user.display_name);
    println!("Email: {}\n", user.effective_email());
    Ok(())
}

pub async fn run_app_loop<F, R>(
    client: &mut MailApiClient<F>,
    store: &dyn CredentialStore,
    input: &mut Lines<R>,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: DeviceCodeFlow,
    R: AsyncBufRead + Unpin,
{
    loop {
        println!("Please choose one of the following options:");
        println!("0. Exit");
        println!("1. Display access token");
        println!("2. List my inbox");
        println!("3. Send mail");
        println!("4. Show my profile");
        println!("5. Save token to cache");

        let Some(line) = input.next_line().await? else {
            break;
        };

        let result = match MenuChoice::parse(&line) {
            MenuChoice::Exit => {
                println!("Goodbye...");
                break;
            }
            MenuChoice::DisplayToken => display_access_token(client).await,
            MenuChoice::ListInbox => list_inbox(client).await,
            MenuChoice::SendMail => send_mail(client, input).await,
            MenuChoice::ShowProfile => show_profile(client).await,
            MenuChoice::SaveToken => save_token(client, store),
            MenuChoice::Invalid => {
                println!("Invalid choice!\n");
                Ok(())
            }
        };

        if let Err(e) = result {
            report_error(&e);
        }
    }
    Ok(())
}

fn report_error(error: &Error) {
    match error {
        Error::Api { code, message, .. } => {
            println!("Error:");
            println!("{code} {message}\n");
        }
        Error::Authentication(e) => println!("Sign-in failed: {e}\n"),
        other => println!("Error: {other}\n"),
    }
}

async fn display_access_token<F: DeviceCodeFlow>(
    client: &mut MailApiClient<F>,
) -> Result<(), Error> {
    let scopes = client.scopes().to_vec();
    let token = client.auth_mut().get_token(&scopes).await?;
    println!("User token: {token}\n");
    Ok(())
}

pub fn format_message(message: &MailMessage) -> String {
    format!(
        "Message: {}\n  From: {}\n  Status: {}\n  Received: {}",
        message.subject,
        message.sender_display_name.as_deref().unwrap_or("NONE"),
        if message.is_read { "Read" } else { "Unread" },
        message.received_at.to_rfc3339(),
    )
}

pub fn format_page(page: &MessagePage) -> String {
    let mut out = String::new();
    for message in &page.items {
        out.push_str(&format_message(message));
        out.push('\n');
    }
    out.push_str(&format!("\nMore messages available? {}\n", page.has_more));
    out
}

async fn list_inbox<F: DeviceCodeFlow>(client: &mut MailApiClient<F>) -> Result<(), Error> {
    let page = client.list_inbox(DEFAULT_PAGE_SIZE).await?;
    println!("{}", format_page(&page));
    Ok(())
}

async fn send_mail<F, R>(client: &mut MailApiClient<F>, input: &mut Lines<R>) -> Result<(), Error>
where
    F: DeviceCodeFlow,
    R: AsyncBufRead + Unpin,
{
    let recipient = match prompt(input, "Recipient (blank for yourself): ").await {
        Some(address) => address,
        None => client.get_profile().await?.effective_email().to_string(),
    };
    let subject = prompt(input, "Subject: ")
        .await
        .unwrap_or_else(|| DEFAULT_SUBJECT.to_string());
    let body = prompt(input, "Body: ")
        .await
        .unwrap_or_else(|| DEFAULT_BODY.to_string());

    client
        .send_mail(OutboundMessage::new(subject, body, recipient))
        .await?;
    println!("Mail sent.\n");
    Ok(())
}

async fn prompt<R: AsyncBufRead + Unpin>(input: &mut Lines<R>, label: &str) -> Option<String> {
    println!("{label}");
    match input.next_line().await {
        Ok(Some(line)) if !line.trim().is_empty() => Some(line.trim().to_string()),
        _ => None,
    }
}

async fn show_profile<F: DeviceCodeFlow>(client: &mut MailApiClient<F>) -> Result<(), Error> {
    let profile = client.get_profile().await?;
    println!("Display Name: {}", profile.display_name);
    println!("User Principal Name: {}\n", profile.user_principal_name);
    Ok(())
}

fn save_token<F: DeviceCodeFlow>(
    client: &MailApiClient<F>,
    store: &dyn CredentialStore,
) -> Result<(), Error> {
    match client.auth().snapshot() {
        Some(record) => {
            store.save(&record)?;
            println!("Login info saved successfully to {}\n", store.location());
        }
        None => println!("Nothing to save yet; sign in first.\n"),
    }
    Ok(())
}
