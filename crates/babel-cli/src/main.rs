//! babel: join a translated conversation from the terminal.
//!
//! Creates a room (or joins one by code), prints room traffic as it
//! arrives and sends typed lines as instant messages. `/say` feeds the
//! typed recognizer so speech results can be exercised without audio.

mod commands;
mod typed;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use babel_common::BabelError;
use babel_config::BabelConfig;
use babel_conversation::{
    ConnectionConfig, Conversation, ConversationTranslator, CreateConversationArgs, RoomManager,
    RoomManagerConfig, TranslatorConfig, TranslatorEvent, TtsFormat, WebSocketConfig,
    WebSocketTransport,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::commands::Input;
use crate::typed::TypedRecognizer;

#[derive(Parser)]
#[command(name = "babel", about = "Join a translated conversation")]
struct Args {
    /// Config file. Defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Join an existing room by code instead of creating one.
    #[arg(short, long)]
    room: Option<String>,

    #[arg(short, long)]
    nickname: Option<String>,

    /// Spoken language, e.g. "en-US".
    #[arg(short, long)]
    language: Option<String>,

    /// Language to translate into. Repeatable.
    #[arg(short = 't', long = "translate-to")]
    translate_to: Vec<String>,

    /// Host code (room pin) for joining as host.
    #[arg(long)]
    host_code: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => babel_config::load_config_from(path),
        None => babel_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("babel: {e}");
            std::process::exit(2);
        }
    };

    let level = config.logging.level.as_directive();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("babel={level},babel_conversation={level}").into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args, config).await {
        tracing::error!(error = %e, "babel exited with an error");
        std::process::exit(1);
    }
}

fn create_args(args: &Args, config: &BabelConfig) -> CreateConversationArgs {
    let service = &config.service;
    let participant = &config.participant;
    let translate_to = if args.translate_to.is_empty() {
        participant.translate_to.clone()
    } else {
        args.translate_to.clone()
    };

    CreateConversationArgs {
        region: (!service.region.is_empty()).then(|| service.region.clone()),
        auth_token: service.auth_token.clone(),
        subscription_key: service.subscription_key.clone(),
        language: args
            .language
            .clone()
            .unwrap_or_else(|| participant.language.clone()),
        nickname: args
            .nickname
            .clone()
            .unwrap_or_else(|| participant.nickname.clone()),
        translate_to,
        tts_voice: participant.tts_voice.clone(),
        tts_format: match participant.tts_format {
            babel_config::TtsFormat::Wav => TtsFormat::Wav,
            babel_config::TtsFormat::WavSiren => TtsFormat::WavSiren,
        },
        client_app_id: service.client_app_id.clone(),
        host_code: args.host_code.clone(),
        correlation_id: None,
    }
}

async fn run(args: Args, config: BabelConfig) -> Result<(), BabelError> {
    let timeouts = &config.timeouts;
    let secs = |s: u32| Duration::from_secs(u64::from(s));

    let rooms = RoomManager::new(RoomManagerConfig {
        endpoint: config.service.rest_url(),
        connect_timeout: secs(timeouts.http_connect_secs),
        request_timeout: secs(timeouts.http_request_secs),
    })?;
    let transport = Arc::new(WebSocketTransport::new(WebSocketConfig {
        connect_timeout: secs(timeouts.connect_secs),
        ping_interval: (timeouts.ping_interval_secs > 0).then(|| secs(timeouts.ping_interval_secs)),
    }));

    let conversation = Conversation::create_or_join(
        Arc::new(rooms),
        transport,
        create_args(&args, &config),
        args.room.as_deref(),
        args.host_code.as_deref(),
        ConnectionConfig {
            endpoint: config.service.websocket_url(),
            connect_timeout: secs(timeouts.connect_secs),
            correlation_id: None,
        },
    )
    .await?;
    tracing::info!(room_code = %conversation.room_code(), "Room ready");

    let recognizer = Arc::new(TypedRecognizer::new());
    let (translator, events) = ConversationTranslator::new(
        recognizer.clone(),
        TranslatorConfig {
            leave_timeout: secs(timeouts.leave_secs),
        },
    );
    tokio::spawn(print_events(events));

    translator
        .join(&conversation, config.participant.end_on_leave)
        .await?;
    println!(
        "Joined room {}. Type /help for commands.",
        conversation.room_code()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let Some(input) = commands::parse(&line) else {
            continue;
        };

        let result = match input {
            Input::Leave => break,
            Input::Help => {
                println!("{}", commands::HELP);
                Ok(())
            }
            Input::Unknown(line) => {
                println!("unknown command: {line}");
                Ok(())
            }
            Input::Text(text) => translator.send_text_message(&text).await,
            Input::Say(text) => {
                if !recognizer.say(&text) {
                    println!("not transcribing; /start first");
                }
                Ok(())
            }
            Input::Start => translator.start_transcribing().await,
            Input::Stop => translator.stop_transcribing().await,
            Input::Rejoin => translator.rejoin().await,
            Input::Nick(name) => conversation.connection().set_nickname(&name).await,
            Input::MuteAll(muted) => conversation.set_mute_everyone_else(muted).await,
            Input::Lock(locked) => conversation.set_room_locked(locked).await,
            Input::Participants => conversation.participants().await.map(|participants| {
                for p in participants {
                    let host = if p.is_host { " (host)" } else { "" };
                    let muted = if p.is_muted { " [muted]" } else { "" };
                    println!("  {} {}{host}{muted}", p.id, p.nickname);
                }
            }),
        };
        match result {
            Ok(()) => {}
            Err(e) if e.is_invalid_operation() => println!("not now: {e}"),
            Err(e) => tracing::warn!(error = %e, code = %e.code(), "Command failed"),
        }
    }

    translator.leave().await?;
    translator.shutdown().await;
    if config.participant.end_on_leave {
        conversation.delete().await?;
    } else {
        conversation.connection().shutdown().await;
    }
    Ok(())
}

async fn print_events(mut events: mpsc::Receiver<TranslatorEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            TranslatorEvent::SessionStarted { session_id } => {
                tracing::debug!(session_id = %session_id, "Session started");
            }
            TranslatorEvent::SessionStopped { session_id } => {
                tracing::debug!(session_id = %session_id, "Session stopped");
            }
            TranslatorEvent::Connected => println!("* connected"),
            TranslatorEvent::Disconnected => println!("* disconnected"),
            TranslatorEvent::Canceled { details } => match details.code {
                Some(code) => println!("* canceled ({code}): {}", details.details),
                None => println!("* canceled: {:?}", details.reason),
            },
            TranslatorEvent::ParticipantsChanged {
                reason,
                participants,
            } => {
                let names: Vec<&str> = participants.iter().map(|p| p.nickname.as_str()).collect();
                println!("* {reason:?}: {}", names.join(", "));
            }
            TranslatorEvent::Transcribing { result } => {
                tracing::debug!(id = %result.id, text = %result.text, "Transcribing");
            }
            TranslatorEvent::Transcribed { result } | TranslatorEvent::TextMessageReceived { result } => {
                println!("<{}> {}", result.participant_id, result.text);
                for t in &result.translations {
                    println!("    [{}] {}", t.language, t.text);
                }
            }
            TranslatorEvent::ConversationExpiration { minutes_left } => {
                println!("* room expires in {minutes_left} minutes");
            }
            TranslatorEvent::RoomLockChanged { locked } => {
                println!("* room {}", if locked { "locked" } else { "unlocked" });
            }
        }
    }
}
