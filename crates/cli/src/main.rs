// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::sync::Once;

use clap::{Parser, Subcommand};
use tracing::error;

use chairside::api::{
    ApiClient, AuthClient, NewAppointment, NewUser, ProfileUpdate, RatingRequest, Role,
};
use chairside::config::ClientConfig;
use chairside::gateway::Gateway;
use chairside::session::{SessionEvent, SessionManager};

/// Command-line client for the chairside booking service.
#[derive(Debug, Parser)]
#[command(name = "chairside", version, about)]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session tokens.
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log in.
    Register {
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
        /// Register as a barber instead of a customer.
        #[arg(long)]
        barber: bool,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Clear the stored session.
    Logout,
    /// Show whether a usable session exists.
    Status,
    /// List bookable services.
    Services,
    /// Manage appointments.
    Appointments {
        #[command(subcommand)]
        command: AppointmentsCommand,
    },
    /// Show or update the profile.
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Manage days off (barber role).
    DaysOff {
        #[command(subcommand)]
        command: DaysOffCommand,
    },
    /// Rate a completed appointment.
    Rate {
        appointment_id: i64,
        #[arg(long)]
        stars: u8,
        #[arg(long)]
        comment: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AppointmentsCommand {
    /// List your appointments.
    List,
    /// Book a new appointment.
    Book {
        #[arg(long)]
        barber: i64,
        #[arg(long)]
        service: i64,
        /// ISO 8601 start time, e.g. 2026-08-10T14:30:00.
        #[arg(long)]
        at: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel an appointment.
    Cancel { id: i64 },
}

#[derive(Debug, Subcommand)]
enum DaysOffCommand {
    /// List your days off.
    List,
    /// Add a day off (ISO 8601 date).
    Add { date: String },
    /// Remove a day off.
    Remove { id: i64 },
}

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    ensure_crypto();

    if let Err(e) = cli.config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    if let Err(e) = run(cli).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (session, mut events) = SessionManager::new(cli.config.clone());

    // The presentation layer's subscription: the core signals expiry, the
    // shell tells the human where to go.
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Expired) => {
                    eprintln!("session expired; run `chairside login` to continue");
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });

    let auth = AuthClient::new(&cli.config, Arc::clone(&session));
    let api = ApiClient::new(Gateway::new(&cli.config, Arc::clone(&session)));

    match cli.command {
        Command::Login { email, password } => {
            auth.login(&email, &password).await?;
            println!("logged in as {email}");
        }
        Command::Register { email, name, password, barber, phone } => {
            let user = NewUser {
                name,
                email: email.clone(),
                password,
                role: if barber { Role::Barber } else { Role::Customer },
                phone,
            };
            auth.register(&user).await?;
            println!("registered {email}");
        }
        Command::Logout => {
            session.clear_tokens();
            println!("logged out");
        }
        Command::Status => {
            if session.is_logged_in().await {
                println!("logged in");
            } else {
                println!("logged out");
            }
        }
        Command::Services => {
            session.refresh_on_start();
            print_json(&api.services().await?)?;
        }
        Command::Appointments { command } => {
            session.refresh_on_start();
            match command {
                AppointmentsCommand::List => print_json(&api.appointments().await?)?,
                AppointmentsCommand::Book { barber, service, at, notes } => {
                    let request = NewAppointment {
                        barber_id: barber,
                        service_id: service,
                        start_time: at,
                        notes,
                    };
                    print_json(&api.book(&request).await?)?;
                }
                AppointmentsCommand::Cancel { id } => {
                    api.cancel(id).await?;
                    println!("appointment {id} cancelled");
                }
            }
        }
        Command::Profile { name, phone } => {
            session.refresh_on_start();
            if name.is_none() && phone.is_none() {
                print_json(&api.profile().await?)?;
            } else {
                let update = ProfileUpdate { name, phone };
                print_json(&api.update_profile(&update).await?)?;
            }
        }
        Command::DaysOff { command } => {
            session.refresh_on_start();
            match command {
                DaysOffCommand::List => print_json(&api.days_off().await?)?,
                DaysOffCommand::Add { date } => print_json(&api.add_day_off(&date).await?)?,
                DaysOffCommand::Remove { id } => {
                    api.remove_day_off(id).await?;
                    println!("day off {id} removed");
                }
            }
        }
        Command::Rate { appointment_id, stars, comment } => {
            session.refresh_on_start();
            let request = RatingRequest { appointment_id, stars, comment };
            print_json(&api.rate(&request).await?)?;
        }
    }

    // One-shot process: make sure no refresh timer outlives the command.
    session.stop();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
