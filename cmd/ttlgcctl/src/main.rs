use clap::{Parser, Subcommand};
use pkg_constants::network::DEFAULT_API_ADDR;
use pkg_types::policy::{GarbageCollectionPolicy, PolicyManifest};
use tracing::info;

#[derive(Parser)]
#[command(name = "ttlgcctl", about = "CLI tool for ttlgc garbage collection policies")]
struct Cli {
    /// Controller API endpoint
    #[arg(long, default_value = DEFAULT_API_ADDR)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage garbage collection policies
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Manage stored resources
    Resource {
        #[command(subcommand)]
        action: ResourceAction,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Create or update policies from a YAML file (`---` separates documents)
    Apply {
        #[arg(short, long)]
        file: String,
    },
    /// List policies
    List {
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Show one policy with its status
    Get {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Delete a policy
    Delete {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Suspend deletions for a policy
    Pause {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
    /// Resume a paused policy
    Resume {
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

#[derive(Subcommand)]
enum ResourceAction {
    /// Store resources from a YAML file (`---` separates documents)
    Apply {
        #[arg(short, long)]
        file: String,
    },
}

/// Split a multi-document YAML file into JSON values, skipping empty documents.
fn read_documents(raw: &str) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut docs = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(raw) {
        let value: serde_json::Value = serde::Deserialize::deserialize(doc)?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

fn print_policies(policies: &[GarbageCollectionPolicy]) {
    println!(
        "{:<16} {:<28} {:<10} {:>8} {:>8} {:>8}  {}",
        "NAMESPACE", "NAME", "PHASE", "MATCHED", "DELETED", "PENDING", "LAST RUN"
    );
    for p in policies {
        let last_run = p
            .status
            .last_gc_run
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "<never>".to_string());
        println!(
            "{:<16} {:<28} {:<10} {:>8} {:>8} {:>8}  {}",
            p.namespace,
            p.name,
            p.status.phase,
            p.status.resources_matched,
            p.status.resources_deleted,
            p.status.resources_pending,
            last_run
        );
    }
    if policies.is_empty() {
        println!("(no policies)");
    }
}

async fn fail_unless_success(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("server returned {}: {}", status, body.trim())
}

async fn set_paused(
    client: &reqwest::Client,
    base: &str,
    namespace: &str,
    name: &str,
    action: &str,
) -> anyhow::Result<GarbageCollectionPolicy> {
    let url = format!(
        "{}/apis/gc/v1/namespaces/{}/policies/{}/{}",
        base, namespace, name, action
    );
    let resp = fail_unless_success(client.post(&url).send().await?).await?;
    Ok(resp.json().await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let base = cli.server.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Policy { action } => match action {
            PolicyAction::Apply { file } => {
                let raw = std::fs::read_to_string(&file)?;
                for doc in read_documents(&raw)? {
                    let manifest: PolicyManifest = serde_json::from_value(doc)?;
                    info!("Applying policy {}/{}", manifest.namespace, manifest.name);
                    let resp = client
                        .post(format!("{}/apis/gc/v1/policies", base))
                        .json(&manifest)
                        .send()
                        .await?;
                    let created = resp.status() == reqwest::StatusCode::CREATED;
                    let policy: GarbageCollectionPolicy =
                        fail_unless_success(resp).await?.json().await?;
                    println!(
                        "policy/{} {}",
                        policy.full_name(),
                        if created { "created" } else { "configured" }
                    );
                }
            }
            PolicyAction::List { namespace } => {
                let mut url = format!("{}/apis/gc/v1/policies", base);
                if let Some(ns) = namespace {
                    url = format!("{}?namespace={}", url, ns);
                }
                let resp = fail_unless_success(client.get(&url).send().await?).await?;
                let policies: Vec<GarbageCollectionPolicy> = resp.json().await?;
                print_policies(&policies);
            }
            PolicyAction::Get { name, namespace } => {
                let url = format!(
                    "{}/apis/gc/v1/namespaces/{}/policies/{}",
                    base, namespace, name
                );
                let resp = fail_unless_success(client.get(&url).send().await?).await?;
                let policy: GarbageCollectionPolicy = resp.json().await?;
                println!("{}", serde_yaml::to_string(&policy)?);
            }
            PolicyAction::Delete { name, namespace } => {
                let url = format!(
                    "{}/apis/gc/v1/namespaces/{}/policies/{}",
                    base, namespace, name
                );
                fail_unless_success(client.delete(&url).send().await?).await?;
                println!("policy/{}/{} deleted", namespace, name);
            }
            PolicyAction::Pause { name, namespace } => {
                let policy = set_paused(&client, &base, &namespace, &name, "pause").await?;
                println!("policy/{} {}", policy.full_name(), policy.status.phase);
            }
            PolicyAction::Resume { name, namespace } => {
                let policy = set_paused(&client, &base, &namespace, &name, "resume").await?;
                println!("policy/{} {}", policy.full_name(), policy.status.phase);
            }
        },
        Commands::Resource { action } => match action {
            ResourceAction::Apply { file } => {
                let raw = std::fs::read_to_string(&file)?;
                for doc in read_documents(&raw)? {
                    let resp = client
                        .post(format!("{}/apis/gc/v1/resources", base))
                        .json(&doc)
                        .send()
                        .await?;
                    let stored: serde_json::Value =
                        fail_unless_success(resp).await?.json().await?;
                    println!(
                        "{}/{} applied",
                        stored["kind"].as_str().unwrap_or_default().to_lowercase(),
                        stored["metadata"]["name"].as_str().unwrap_or_default()
                    );
                }
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_document_yaml_is_split() {
        let raw = r#"
name: old-jobs
namespace: batch
spec:
  targetResource:
    apiVersion: batch/v1
    kind: Job
  ttl:
    secondsAfterCreation: 3600
---
---
name: stale-configmaps
spec:
  targetResource:
    apiVersion: v1
    kind: ConfigMap
  ttl:
    fieldPath: metadata.annotations.ttl
"#;
        let docs = read_documents(raw).unwrap();
        assert_eq!(docs.len(), 2);
        let second: PolicyManifest = serde_json::from_value(docs[1].clone()).unwrap();
        assert_eq!(second.namespace, "default");
        assert_eq!(second.spec.target_resource.kind, "ConfigMap");
    }

    #[test]
    fn policy_commands_parse() {
        let cli = Cli::try_parse_from(["ttlgcctl", "policy", "get", "old-jobs", "-n", "batch"])
            .unwrap();
        assert_eq!(cli.server, DEFAULT_API_ADDR);
        match cli.command {
            Commands::Policy {
                action: PolicyAction::Get { name, namespace },
            } => {
                assert_eq!(name, "old-jobs");
                assert_eq!(namespace, "batch");
            }
            _ => panic!("expected policy get"),
        }
    }

    #[test]
    fn pause_and_resume_parse() {
        let cli = Cli::try_parse_from(["ttlgcctl", "policy", "pause", "old-jobs", "-n", "batch"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Policy {
                action: PolicyAction::Pause { ref name, ref namespace }
            } if name == "old-jobs" && namespace == "batch"
        ));

        let cli = Cli::try_parse_from(["ttlgcctl", "policy", "resume", "old-jobs"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Policy {
                action: PolicyAction::Resume { ref namespace, .. }
            } if namespace == "default"
        ));
    }
}
