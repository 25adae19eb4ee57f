use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};
use papago_mt::{
    BatchEvent, ClientConfig, Engine, MachineTranslator, MockMode, MockTranslator, OcrClient,
    PapagoClient, TranslateOptions, Voice, VoiceParams, run_batch,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

fn text_arg() -> Arg {
    Arg::new("text")
        .help("Input text")
        .required(true)
        .index(1)
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, String> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| format!("missing argument: {}", name))
}

fn level(matches: &ArgMatches, name: &str) -> i8 {
    matches.get_one::<i8>(name).copied().unwrap_or(0)
}

fn cli() -> Command {
    let level_arg = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .help(help)
            .value_parser(clap::value_parser!(i8).range(-5..=5))
            .allow_negative_numbers(true)
            .default_value("0")
    };

    Command::new("papago-mt")
        .version("0.1.0")
        .about("Papago machine translation client")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .help("JSON configuration file (default: PAPAGO_* environment variables)"),
        )
        .subcommand(
            Command::new("detect")
                .about("Detect the language of a text")
                .arg(text_arg())
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .help("Print the provider's detection object")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a text")
                .arg(text_arg())
                .arg(
                    Arg::new("target")
                        .help("Target language code (e.g., ko, ja, zh-CN)")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .short('s')
                        .help("Source language code (default: detected)"),
                )
                .arg(
                    Arg::new("statistical")
                        .long("statistical")
                        .help("Request the statistical engine")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("honorific")
                        .long("honorific")
                        .help("Prefer honorific forms")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .help("Print every chunk's provider result")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("tts")
                .about("Synthesize speech for a text")
                .arg(text_arg())
                .arg(
                    Arg::new("female")
                        .long("female")
                        .help("Use the female voice")
                        .action(ArgAction::SetTrue),
                )
                .arg(level_arg("speed", "Speech speed, -5..5"))
                .arg(level_arg("alpha", "Voice tone, -5..5"))
                .arg(level_arg("pitch", "Voice pitch, -5..5"))
                .arg(
                    Arg::new("save")
                        .long("save")
                        .help("Directory to download the audio into"),
                ),
        )
        .subcommand(
            Command::new("batch")
                .about("Translate the text in every image of a directory")
                .arg(
                    Arg::new("dir")
                        .help("Directory with jpeg/jpg/png/webp images")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .short('t')
                        .help("Target language code")
                        .default_value("ko"),
                )
                .arg(
                    Arg::new("account")
                        .long("account")
                        .help("OCR service account (default: ocr_account from configuration)"),
                )
                .arg(
                    Arg::new("ocr-url")
                        .long("ocr-url")
                        .help("OCR service base URL, overrides --account"),
                )
                .arg(
                    Arg::new("mock")
                        .long("mock")
                        .short('m')
                        .help("Use mock translator instead of Papago")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    Ok(match matches.get_one::<String>("config") {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::from_env()?,
    })
}

async fn batch(
    config: ClientConfig,
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = PathBuf::from(arg(matches, "dir")?);
    let target = arg(matches, "target")?;

    let ocr = match (
        matches.get_one::<String>("ocr-url"),
        matches.get_one::<String>("account").or(config.ocr_account.as_ref()),
    ) {
        (Some(url), _) => OcrClient::new(url),
        (None, Some(account)) => OcrClient::for_account(account)?,
        (None, None) => return Err("no OCR service: pass --ocr-url or --account".into()),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, finishing up");
            on_interrupt.cancel();
        }
    });

    let mut translator: Box<dyn MachineTranslator> = if matches.get_flag("mock") {
        Box::new(MockTranslator::new(MockMode::Suffix))
    } else {
        Box::new(PapagoClient::new(config)?.with_cancellation(cancel.clone()))
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                BatchEvent::Progress(percent) => eprintln!("[{:>3}%]", percent),
                BatchEvent::Log(line) => println!("{}", line),
            }
        }
    });

    let summary = run_batch(&ocr, translator.as_mut(), &dir, target, tx, cancel).await?;
    printer.await?;

    eprintln!(
        "{} of {} images written, {} not rendered, {} failed",
        summary.written.len(),
        summary.total,
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?),
        )
        .init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("detect", sub)) => {
            let mut client = PapagoClient::new(config)?;
            let text = arg(sub, "text")?;
            if sub.get_flag("raw") {
                match client.detect_language_raw(text).await? {
                    Some(raw) => println!("{}", serde_json::to_string_pretty(&raw)?),
                    None => println!("null"),
                }
            } else {
                println!("{}", client.detect_language(text).await?);
            }
        }
        Some(("translate", sub)) => {
            let mut client = PapagoClient::new(config)?;
            let text = arg(sub, "text")?;
            let target = arg(sub, "target")?;
            let options = TranslateOptions {
                source: sub.get_one::<String>("source").cloned(),
                engine: if sub.get_flag("statistical") {
                    Engine::Statistical
                } else {
                    Engine::Neural
                },
                honorific: sub.get_flag("honorific"),
            };

            if sub.get_flag("raw") {
                for chunk in client.translate_raw(text, target, &options).await? {
                    let raw = chunk.raw.unwrap_or(serde_json::Value::Null);
                    println!("[{}] {}", chunk.index, serde_json::to_string(&raw)?);
                }
            } else {
                println!("{}", client.translate(text, target, &options).await?);
            }
        }
        Some(("tts", sub)) => {
            let mut client = PapagoClient::new(config)?;
            let voice = VoiceParams::new(
                if sub.get_flag("female") {
                    Voice::Female
                } else {
                    Voice::Male
                },
                level(sub, "speed"),
                level(sub, "alpha"),
                level(sub, "pitch"),
            );
            let save = sub.get_one::<String>("save").map(Path::new);

            match client.synthesize_speech(arg(sub, "text")?, &voice, save).await? {
                Some(output) => {
                    for (index, url) in &output.urls {
                        println!("[{}] {}", index, url);
                    }
                    if let Some(path) = output.saved {
                        println!("Saved to {}", path.display());
                    }
                }
                None => {
                    eprintln!("No voice available for this language");
                    std::process::exit(1);
                }
            }
        }
        Some(("batch", sub)) => batch(config, sub).await?,
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}
