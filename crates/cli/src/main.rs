use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatbot_core::{ClassifierConfig, InboundMessage, IntentClassifier};
use chatbot_observability::{init_tracing, AppMetrics};
use chatbot_responder::{ChatResponder, WhatsAppConfig, WhatsAppSender};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chatbot")]
#[command(about = "Rule-based WhatsApp responder CLI")]
struct Cli {
    /// JSON rule file replacing the built-in tables.
    #[arg(long, env = "CHATBOT_RULES_PATH")]
    rules: Option<PathBuf>,

    #[arg(long, env = "CHATBOT_BOT_NAME")]
    bot_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the reply for one message.
    Classify {
        text: String,
        /// Print the full classification as JSON.
        #[arg(long)]
        explain: bool,
    },
    Chat,
    /// Classify a message and deliver the reply over WhatsApp.
    Send {
        #[arg(long)]
        to: String,
        text: String,
    },
    /// Dump the active rule tables as JSON.
    Rules,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("chatbot_cli");
    let cli = Cli::parse();

    let config = ClassifierConfig::load(cli.rules.as_deref(), cli.bot_name.as_deref())?;
    let classifier = IntentClassifier::new(config.clone())?;

    match cli.command {
        Command::Classify { text, explain } => {
            if explain {
                let classification = classifier.classify_detailed(Some(&text));
                println!("{}", serde_json::to_string_pretty(&classification)?);
            } else {
                println!("{}", classifier.classify(Some(&text)));
            }
        }
        Command::Chat => run_chat(classifier)?,
        Command::Send { to, text } => {
            let whatsapp = WhatsAppConfig::from_env()
                .context("WHATSAPP_TOKEN and WHATSAPP_PHONE_NUMBER_ID must be set to send")?;
            let responder = ChatResponder::new(
                Arc::new(classifier),
                Arc::new(WhatsAppSender::new(whatsapp)?),
                AppMetrics::shared(),
            );

            let outcome = responder
                .handle_inbound(&InboundMessage {
                    from: to,
                    message_id: None,
                    text: Some(text),
                })
                .await
                .context("failed to deliver reply")?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Rules => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn run_chat(classifier: IntentClassifier) -> Result<()> {
    println!("Chatbot chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        println!("\n{}\n", classifier.classify(Some(message)));
    }

    Ok(())
}
