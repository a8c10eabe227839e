//! ClinicQ CLI Client
//!
//! Command-line interface for interacting with a ClinicQ server.

use clap::{Parser, Subcommand};
use clinicq::clock::SystemClock;
use clinicq::network::Client;
use clinicq::protocol::Request;
use clinicq::{DateKey, Result};

/// ClinicQ CLI
#[derive(Parser, Debug)]
#[command(name = "clinicq-cli")]
#[command(about = "CLI for the ClinicQ engine")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7411")]
    server: String,

    /// Operational day (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    date: Option<String>,

    /// Service time zone as a UTC offset in minutes (used when --date is omitted)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    utc_offset_minutes: i32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue the next PIN for a clinic
    IssuePin {
        clinic: String,

        /// Replays the first response when retried with the same key
        #[arg(long)]
        idempotency_key: Option<String>,
    },

    /// Check whether a PIN was issued today
    ValidatePin { clinic: String, pin: String },

    /// Put a visit in a clinic's queue
    Enter {
        clinic: String,
        visit: String,

        #[arg(long)]
        pin: Option<String>,
    },

    /// Call the next ticket into service
    CallNext { clinic: String },

    /// Finish service for a ticket
    Complete { clinic: String, ticket: u64 },

    /// Show queue counts and statistics
    Status { clinic: String },

    /// Show a visit's position in line
    Position { clinic: String, visit: String },

    /// Compute (or fetch) a patient's clinic order
    AssignPath { patient: String, exam_type: String },

    /// Record a finished clinic and get the next one
    AdvancePath {
        patient: String,
        exam_type: String,
        completed_clinic: String,
    },

    /// Reset a clinic's PIN pool and queue for the day
    Reset { clinic: String },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let date_key = match &args.date {
        Some(d) => DateKey::parse(d)?,
        None => DateKey::today(&SystemClock, args.utc_offset_minutes * 60)?,
    };

    let request = match args.command {
        Commands::IssuePin {
            clinic,
            idempotency_key,
        } => Request::IssuePin {
            clinic_id: clinic,
            date_key,
            idempotency_key,
        },
        Commands::ValidatePin { clinic, pin } => Request::ValidatePin {
            clinic_id: clinic,
            date_key,
            pin,
        },
        Commands::Enter { clinic, visit, pin } => Request::Enter {
            clinic_id: clinic,
            date_key,
            visit_id: visit,
            pin,
        },
        Commands::CallNext { clinic } => Request::CallNext {
            clinic_id: clinic,
            date_key,
        },
        Commands::Complete { clinic, ticket } => Request::Complete {
            clinic_id: clinic,
            date_key,
            ticket_number: ticket,
        },
        Commands::Status { clinic } => Request::QueueStatus {
            clinic_id: clinic,
            date_key,
        },
        Commands::Position { clinic, visit } => Request::Position {
            clinic_id: clinic,
            date_key,
            visit_id: visit,
        },
        Commands::AssignPath { patient, exam_type } => Request::AssignPath {
            patient_id: patient,
            exam_type,
        },
        Commands::AdvancePath {
            patient,
            exam_type,
            completed_clinic,
        } => Request::AdvancePath {
            patient_id: patient,
            exam_type,
            completed_clinic_id: completed_clinic,
        },
        Commands::Reset { clinic } => Request::ResetClinicDay {
            clinic_id: clinic,
            date_key,
        },
        Commands::Ping => Request::Ping,
    };

    let mut client = Client::connect(&args.server)?;
    let reply = client.call(&request)?;
    println!("{}", serde_json::to_string_pretty(&reply.to_json_value()?)?);
    Ok(())
}
