//! Crewline CLI - cleaning job coordination.

mod config;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use crewline_core::{
    current_statuses, Actor, AttendanceKind, BookingEntry, BookingEntryId, BookingPatch,
    NewBooking, Property, PropertyId, Role, TransitionAux, TransitionTable, UserId, WorkState,
    WorkUnit, WorkUnitFilter, WorkUnitId,
};
use crewline_notify::Dispatcher;
use crewline_storage::{JsonStorage, Storage};
use crewline_work::{AssignRequest, TransitionEngine, Workflow};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "crewline")]
#[command(about = "Cleaning job coordination", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "crewline.json")]
    config: PathBuf,

    /// Acting user id
    #[arg(long)]
    user: String,

    /// Role to act under (owner, manager, crew)
    #[arg(long)]
    role: Role,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage properties
    Property {
        #[command(subcommand)]
        action: PropertyCommand,
    },
    /// Manage bookings
    Booking {
        #[command(subcommand)]
        action: BookingCommand,
    },
    /// Inspect and move work units
    Unit {
        #[command(subcommand)]
        action: UnitCommand,
    },
    /// Assign crew to a unit
    Assign {
        /// Work unit ID
        unit: WorkUnitId,
        /// Crew user ids
        #[arg(required = true)]
        crew: Vec<String>,
        /// Replace the current crew instead of adding
        #[arg(long)]
        replace: bool,
        /// Note for the crew
        #[arg(long)]
        remark: Option<String>,
    },
    /// Remove one crew member from a unit
    Unassign {
        /// Work unit ID
        unit: WorkUnitId,
        /// Crew user id
        crew: String,
    },
    /// Record arrival at a unit
    CheckIn {
        /// Work unit ID
        unit: WorkUnitId,
    },
    /// Record departure from a unit
    CheckOut {
        /// Work unit ID
        unit: WorkUnitId,
    },
    /// Re-derive a unit's state from its attendance log
    Resync {
        /// Work unit ID
        unit: WorkUnitId,
    },
}

#[derive(Subcommand)]
enum PropertyCommand {
    /// Register a property
    Add {
        /// Property ID
        id: String,
        /// Display name
        name: String,
        /// Manager user ids
        #[arg(long = "manager")]
        managers: Vec<String>,
    },
}

#[derive(Subcommand)]
enum BookingCommand {
    /// Declare a stay
    Create {
        /// Property ID
        property: String,
        /// First night
        #[arg(long)]
        start: NaiveDate,
        /// Checkout day
        #[arg(long)]
        end: NaiveDate,
        /// Number of guests
        #[arg(long, default_value = "1")]
        occupants: u32,
        /// Note for the crew
        #[arg(long)]
        remark: Option<String>,
        /// Cleaning day, repeatable (defaults to the checkout day)
        #[arg(long = "date")]
        dates: Vec<NaiveDate>,
    },
    /// Edit a stay
    Edit {
        /// Booking ID
        id: BookingEntryId,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long)]
        occupants: Option<u32>,
        #[arg(long)]
        remark: Option<String>,
        /// Replace the cleaning days, repeatable
        #[arg(long = "date")]
        dates: Vec<NaiveDate>,
        /// Reset cleaning to the checkout day only
        #[arg(long, conflicts_with = "dates")]
        checkout_only: bool,
    },
    /// Delete a stay and all its units
    Delete {
        /// Booking ID
        id: BookingEntryId,
    },
    /// Show a stay and its units
    Show {
        /// Booking ID
        id: BookingEntryId,
    },
    /// List stays at a property
    List {
        /// Property ID
        property: String,
    },
}

#[derive(Subcommand)]
enum UnitCommand {
    /// List work units
    List {
        /// Filter by property
        #[arg(long)]
        property: Option<String>,
        /// Filter by assigned crew member
        #[arg(long)]
        crew: Option<String>,
        /// Filter by state
        #[arg(long)]
        state: Option<WorkState>,
    },
    /// Show unit details
    Show {
        /// Work unit ID
        id: WorkUnitId,
    },
    /// Move a unit to another state
    Transition {
        /// Work unit ID
        id: WorkUnitId,
        /// Target state
        to: WorkState,
        /// State you expect the unit to be in
        #[arg(long)]
        expect: Option<WorkState>,
        /// Crew, when moving to assigned
        #[arg(long = "crew")]
        crew: Vec<String>,
        /// Report, when confirming
        #[arg(long)]
        report: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let actor = cli_actor(&cli.user, cli.role)?;
    let workflow = open_workflow(&config).await?;

    match cli.command {
        Commands::Property { action } => match action {
            PropertyCommand::Add { id, name, managers } => {
                let property = Property::new(PropertyId::new(id), name, actor.user_id.clone())
                    .with_managers(managers.into_iter().map(UserId::new));
                workflow.save_property(&property).await?;
                println!("Added property: {} - {}", property.id, property.name);
            }
        },
        Commands::Booking { action } => run_booking(&workflow, &actor, action).await?,
        Commands::Unit { action } => run_unit(&workflow, &actor, action).await?,
        Commands::Assign { unit, crew, replace, remark } => {
            let crew = crew.into_iter().map(UserId::new).collect();
            let mut request = if replace {
                AssignRequest::replace(unit, crew)
            } else {
                AssignRequest::append(unit, crew)
            };
            request.remark = remark;
            let outcome = workflow.assign(request, &actor).await?;
            println!(
                "Unit {} is {} with crew [{}]",
                outcome.unit.id,
                outcome.unit.state,
                join(&outcome.unit.assigned_crew_ids)
            );
        }
        Commands::Unassign { unit, crew } => {
            let unit = workflow.unassign(unit, &UserId::new(crew), &actor).await?;
            println!("Unit {} crew [{}]", unit.id, join(&unit.assigned_crew_ids));
        }
        Commands::CheckIn { unit } => {
            let receipt = workflow
                .record_attendance(unit, &actor, AttendanceKind::CheckIn)
                .await?;
            println!("Checked in at {} ({:?})", receipt.record.timestamp, receipt.outcome);
        }
        Commands::CheckOut { unit } => {
            let receipt = workflow
                .record_attendance(unit, &actor, AttendanceKind::CheckOut)
                .await?;
            println!("Checked out at {} ({:?})", receipt.record.timestamp, receipt.outcome);
        }
        Commands::Resync { unit } => {
            let outcome = workflow.resync(unit).await?;
            println!("Resync: {:?}", outcome);
        }
    }

    Ok(())
}

async fn open_workflow(config: &CliConfig) -> Result<Workflow> {
    let storage: Arc<dyn Storage> = Arc::new(
        JsonStorage::new(&config.data_dir)
            .await
            .with_context(|| format!("opening data dir {}", config.data_dir.display()))?,
    );

    let channel = config
        .notify
        .build_channel()
        .context("building notification channel")?;
    debug!(channel = channel.name(), "notification channel ready");

    if config.engine.detached_dispatch {
        warn!("detached dispatch may drop notifications when the command exits");
    }

    let dispatcher = Dispatcher::new(storage.clone(), Arc::new(config.notify.resolver()), channel)
        .with_templates(config.notify.templates());
    let engine = TransitionEngine::new(storage.clone())
        .with_dispatcher(Arc::new(dispatcher))
        .with_config(config.engine.clone());

    Ok(Workflow::with_engine(storage, engine))
}

async fn run_booking(workflow: &Workflow, actor: &Actor, action: BookingCommand) -> Result<()> {
    match action {
        BookingCommand::Create { property, start, end, occupants, remark, dates } => {
            let input = NewBooking {
                property_id: PropertyId::new(property),
                stay_start: start,
                stay_end: end,
                occupant_count: occupants,
                owner_remark: remark.unwrap_or_default(),
                work_dates: dates.into_iter().collect(),
            };
            let entry = workflow.create_booking(actor, input).await?;
            println!("Created booking: {}", entry.id);
            print_units(&workflow.work_units_for_booking(entry.id).await?);
        }
        BookingCommand::Edit { id, start, end, occupants, remark, dates, checkout_only } => {
            let work_dates = if checkout_only {
                Some(BTreeSet::new())
            } else if dates.is_empty() {
                None
            } else {
                Some(dates.into_iter().collect())
            };
            let patch = BookingPatch {
                stay_start: start,
                stay_end: end,
                occupant_count: occupants,
                owner_remark: remark,
                work_dates,
            };
            let entry = workflow.apply_booking_edit(id, patch, actor).await?;
            print_booking(&entry);
            print_units(&workflow.work_units_for_booking(entry.id).await?);
        }
        BookingCommand::Delete { id } => {
            let removed = workflow.delete_booking(id, actor).await?;
            println!("Deleted booking {} and {} work units", id, removed);
        }
        BookingCommand::Show { id } => {
            let Some(entry) = workflow.booking(id).await? else {
                println!("Booking not found");
                return Ok(());
            };
            print_booking(&entry);
            print_units(&workflow.work_units_for_booking(entry.id).await?);
        }
        BookingCommand::List { property } => {
            let entries = workflow
                .bookings_for_property(&PropertyId::new(property))
                .await?;
            println!("Bookings ({})", entries.len());
            for entry in entries {
                println!(
                    "  {} | {} → {} | {} guests | {} days",
                    entry.id,
                    entry.stay_start,
                    entry.stay_end,
                    entry.occupant_count,
                    entry.work_dates.len()
                );
            }
        }
    }
    Ok(())
}

async fn run_unit(workflow: &Workflow, actor: &Actor, action: UnitCommand) -> Result<()> {
    match action {
        UnitCommand::List { property, crew, state } => {
            let filter = WorkUnitFilter {
                property_id: property.map(PropertyId::new),
                crew_id: crew.map(UserId::new),
                states: state.map(|s| vec![s]),
                ..Default::default()
            };
            let units = workflow.storage().list_work_units(&filter).await?;
            print_units(&units);
        }
        UnitCommand::Show { id } => {
            let unit = workflow
                .work_unit(id)
                .await?
                .ok_or_else(|| anyhow!("work unit {} not found", id))?;
            print_unit(&unit);

            let targets = TransitionTable::allowed_targets_for(unit.state, actor.role);
            let targets: Vec<&str> = targets.iter().map(WorkState::as_str).collect();
            println!("  You can move it to: [{}]", targets.join(", "));

            for row in workflow.assignments(id).await? {
                println!("  Assigned {} by {} at {}", row.crew_id, row.assigned_by, row.assigned_at);
            }
            let log = workflow.attendance(id).await?;
            let mut statuses: Vec<_> = current_statuses(&log).into_iter().collect();
            statuses.sort_by(|a, b| a.0.cmp(&b.0));
            for (crew, kind) in statuses {
                println!("  {}: {}", crew, kind);
            }
        }
        UnitCommand::Transition { id, to, expect, crew, report } => {
            let aux = TransitionAux {
                assigned_crew_ids: crew.into_iter().map(UserId::new).collect(),
                manager_report: report,
            };
            let unit = workflow.advance(id, expect, to, actor.clone(), aux).await?;
            println!("Unit {} is now {}", unit.id, unit.state);
        }
    }
    Ok(())
}

fn print_booking(entry: &BookingEntry) {
    println!("Booking: {}", entry.id);
    println!("  Property: {}", entry.property_id);
    println!("  Stay: {} → {}", entry.stay_start, entry.stay_end);
    println!("  Guests: {}", entry.occupant_count);
    if !entry.owner_remark.is_empty() {
        println!("  Remark: {}", entry.owner_remark);
    }
    println!("  Created by: {}", entry.created_by);
}

fn print_units(units: &[WorkUnit]) {
    println!("Work units ({})", units.len());
    for unit in units {
        println!(
            "  {} | {} | {} | crew [{}]",
            unit.id,
            unit.work_date,
            unit.state,
            join(&unit.assigned_crew_ids)
        );
    }
}

fn print_unit(unit: &WorkUnit) {
    println!("Work unit: {}", unit.id);
    println!("  Property: {}", unit.property_id);
    println!("  Date: {}", unit.work_date);
    println!("  State: {}", unit.state);
    println!("  Guests: {}", unit.occupant_count);
    println!("  Crew: [{}]", join(&unit.assigned_crew_ids));
    println!("  Accepted: [{}]", join(&unit.accepted_crew_ids));
    if let Some(report) = &unit.manager_report {
        println!("  Report: {}", report);
    }
    if let Some(at) = unit.completed_at {
        println!("  Completed: {}", at);
    }
    if let Some(at) = unit.confirmed_at {
        println!("  Confirmed: {}", at);
    }
}

/// The `system` role belongs to attendance sync and is never taken by a person.
fn cli_actor(user: &str, role: Role) -> Result<Actor> {
    if role == Role::System {
        bail!("role 'system' is reserved for automatic transitions");
    }
    Ok(Actor::new(user, role))
}

fn join(ids: &[UserId]) -> String {
    ids.iter().map(UserId::as_str).collect::<Vec<_>>().join(", ")
}
