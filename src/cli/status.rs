use std::time::Duration;

use console::style;
use serde_json::Value;
use tracing::info;

use crate::cli::commands::StatusArgs;
use crate::errors::{with_retry, ApexError, RetryPolicy};

async fn fetch_job(client: &reqwest::Client, url: &str) -> Result<Value, ApexError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| ApexError::Network(format!("Failed to query job: {}", e)))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(ApexError::UnknownJob(url.rsplit('/').next().unwrap_or_default().to_string()));
    }
    resp.json()
        .await
        .map_err(|e| ApexError::Network(format!("Invalid response: {}", e)))
}

pub async fn handle_status(args: StatusArgs) -> Result<(), ApexError> {
    info!(job_id = %args.job_id, "Querying job status");

    let client = reqwest::Client::new();
    let url = format!("{}/api/jobs/{}", args.server.trim_end_matches('/'), args.job_id);
    let policy = RetryPolicy { max_retries: 2, backoff_base_secs: 1.0, backoff_cap_secs: 5.0, ..RetryPolicy::default() };

    loop {
        let job = with_retry("query job status", &policy, || fetch_job(&client, &url)).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(&job)?);
        } else {
            print_job(&job);
        }

        let status = job["status"].as_str().unwrap_or("");
        // A job only reports "failed" once no retry is left.
        let terminal = matches!(status, "completed" | "failed" | "cancelled");
        if !args.follow || terminal {
            break;
        }
        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
    Ok(())
}

fn print_job(job: &Value) {
    let status = job["status"].as_str().unwrap_or("unknown");
    let styled = match status {
        "completed" => style(status).green(),
        "failed" => style(status).red(),
        "cancelled" => style(status).dim(),
        _ => style(status).yellow(),
    };
    println!("Job:       {}", job["id"].as_str().unwrap_or("-"));
    println!("Test case: {}", job["test_case_id"].as_str().unwrap_or("-"));
    println!("Status:    {}", styled);
    println!("Priority:  {}", job["priority"]);
    println!("Retries:   {}/{}", job["retries"], job["max_retries"]);
    if let Some(eta) = job["eta_secs"].as_f64() {
        println!("ETA:       {:.0}s", eta);
    }
    if let Some(err) = job["error_message"].as_str() {
        println!("Error:     {}", err);
    }
}
