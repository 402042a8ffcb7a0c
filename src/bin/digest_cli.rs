use calendar_digest::config::Config;
use calendar_digest::error::{config_error, other_error, DigestResult};
use calendar_digest::startup::{build_http_client, build_workflow};
use url::Url;

#[tokio::main]
async fn main() -> DigestResult<()> {
    // Load configuration
    let config = Config::load()?;
    let redirect = Url::parse(&config.google_redirect_uri)
        .map_err(|e| config_error(&format!("Invalid GOOGLE_REDIRECT_URI: {}", e)))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| config_error("GOOGLE_REDIRECT_URI has no port"))?;

    let client = build_http_client(&config)?;
    let workflow = build_workflow(&config, client)?;

    // Generate random state for security
    let state = uuid::Uuid::new_v4().to_string();
    let auth_url = workflow.begin_authorization(Some(&state));

    // Open browser for authorization
    println!("Opening browser for Google Calendar authorization...");
    if webbrowser::open(&auth_url).is_err() {
        println!("Open this URL manually:\n{}", auth_url);
    }

    // Start local server on the redirect port to receive the callback
    let server = tiny_http::Server::http(("127.0.0.1", port))
        .map_err(|e| other_error(&format!("Failed to start callback listener: {}", e)))?;
    println!("Waiting for authorization callback on port {}...", port);

    let request = server.recv()?;
    let callback = redirect
        .join(request.url())
        .map_err(|e| other_error(&format!("Malformed callback URL: {}", e)))?;

    let param = |name: &str| {
        callback
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if param("state").as_deref() != Some(state.as_str()) {
        request.respond(tiny_http::Response::from_string("State mismatch."))?;
        return Err(other_error("Callback state does not match"));
    }
    let code = param("code").ok_or_else(|| other_error("No authorization code found in callback"))?;

    let completed = match workflow.complete_authorization(&code).await {
        Ok(completed) => completed,
        Err(e) => {
            request.respond(tiny_http::Response::from_string(
                "Authentication or event fetch failed.",
            ))?;
            return Err(e);
        }
    };

    // Send success response to browser
    request.respond(tiny_http::Response::from_string(
        "Authorization successful! You can close this window.",
    ))?;

    println!("\n{}\n", completed.digest.summary);
    for event in &completed.digest.events {
        println!("- {} ({})", event.title, event.time);
    }

    // Optionally make the events searchable later
    if let Ok(user_id) = std::env::var("DIGEST_USER_ID") {
        let report = workflow
            .store_all_event_summaries(&user_id, &completed.digest.events)
            .await;
        println!("\nStored {} event summaries for {}", report.stored, user_id);
        for failure in &report.failed {
            println!("  failed: {} ({})", failure.title, failure.error);
        }
    }

    Ok(())
}
