// Copyright (C) 2026 by GiGa infosystems

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{bail, eyre},
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use distro_statusdiff::check::{next_check_timestamp, run_check};
use distro_statusdiff::config::Config;
use distro_statusdiff::foreign::ForeignRepository;
use distro_statusdiff::report::{Report, maintainer_address};
use distro_statusdiff::status::load_local_packages;
use distro_statusdiff::store::{HistoryStore, MemoryStore, SqliteStore};
use distro_statusdiff::version::VersionScheme;

enum TemplateContext {
    Minijinja {
        path: PathBuf,
        jinja: Box<minijinja::Environment<'static>>,
    },
    OnlyDefaults,
}

impl TemplateContext {
    fn init(path: Option<PathBuf>) -> Result<Self> {
        match path {
            None => Ok(TemplateContext::OnlyDefaults),
            Some(path) => {
                if !path.is_dir() {
                    bail!("Template directory doesn't exist");
                }

                let mut jinja = minijinja::Environment::new();
                jinja.set_loader(minijinja::path_loader(&path));
                jinja.add_filter("maintainer_address", |maintainer: String| {
                    maintainer_address(&maintainer).to_owned()
                });

                Ok(TemplateContext::Minijinja {
                    path,
                    jinja: Box::new(jinja),
                })
            }
        }
    }

    fn render(&self, name: &str, ctx: &impl Serialize) -> Result<Option<String>> {
        match self {
            TemplateContext::Minijinja { path, jinja } if path.join(name).is_file() => {
                Ok(Some(jinja.get_template(name)?.render(ctx)?))
            }
            TemplateContext::Minijinja { .. } | TemplateContext::OnlyDefaults => Ok(None),
        }
    }

    fn render_output(&self, name: &str, ctx: &impl Serialize) -> Result<String> {
        match self.render(name, ctx)? {
            Some(out) => Ok(out),
            None => Ok(serde_json::to_string_pretty(ctx)?),
        }
    }
}

struct OutputConfig {
    templated_output: bool,
    template_ctx: TemplateContext,
}

impl OutputConfig {
    const REPORT: &str = "report.jinja";

    fn report(&self, report: &Report) -> Result<()> {
        if self.templated_output {
            println!("{}", self.template_ctx.render_output(Self::REPORT, report)?);
            Ok(())
        } else {
            output_json(report)
        }
    }
}

fn output_json(value: &impl Serialize) -> Result<()> {
    use std::io::{self, IsTerminal};

    if io::stdout().is_terminal() {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", serde_json::to_string(value)?);
    }

    Ok(())
}

/// This program compares the packages of a distribution against the versions available in foreign
/// repositories, records a snapshot per check and reports what changed since the previous one.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The path to the YAML configuration
    #[arg(short, long, default_value = "tracker.yml")]
    config: PathBuf,
    /// The path to the history database, overriding the configured one
    #[arg(short, long)]
    database: Option<PathBuf>,
    /// The version ordering to use, overriding the configured one
    #[arg(long, value_enum)]
    version_scheme: Option<VersionScheme>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a check and print the report
    ///
    /// Checks are keyed by the second they run in. A check in the same second as the latest one
    /// is recorded one second after it.
    Check {
        /// Produce templated output (or prettified JSON for a missing template)
        #[arg(short, long)]
        templated: bool,
        /// The path to a directory containing minijinja templates
        ///
        /// The report is rendered with `report.jinja`, which receives the same context as the
        /// JSON output.
        ///
        /// Extra functions implemented:
        /// * `maintainer_address` (filter): The address of a `Name <address>` maintainer
        #[arg(short = 'T', long, verbatim_doc_comment)]
        template_path: Option<PathBuf>,
        /// Don't persist anything, compare against the latest recorded snapshot only
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Print the most recent checks
    History {
        /// The amount of checks to print, defaults to the configured `history_limit`
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Print the record of a package from the latest snapshot
    Show { package: String },
}

struct AppContext {
    config: Config,
}

impl AppContext {
    fn new(args: &Args) -> Result<Self> {
        let mut config = Config::load(&args.config)?;
        if let Some(ref database) = args.database {
            config.database = database.clone();
        }
        if let Some(version_scheme) = args.version_scheme {
            config.version_scheme = version_scheme;
        }
        Ok(AppContext { config })
    }

    fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.config.database)
            .map_err(|err| eyre!("Failed to open database {:?}: {err}", self.config.database))
    }

    fn check_task(&self, output: &OutputConfig, dry_run: bool) -> Result<()> {
        let local_packages = load_local_packages(&self.config.local_packages)?;
        let repositories = self.config.load_repositories()?;

        let mut store: Box<dyn HistoryStore> = if !dry_run {
            Box::new(self.open_store()?)
        } else if self.config.database.exists() {
            info!("Dry run, nothing will be persisted");
            let sqlite = SqliteStore::open_read_only(&self.config.database)?;
            Box::new(MemoryStore::seeded_from(&sqlite, self.config.history_limit)?)
        } else {
            info!("Dry run without a database, this check has nothing to compare against");
            Box::new(MemoryStore::default())
        };

        let mut foreign_changes = Vec::new();
        for repository in &repositories {
            match repository.ingest(&mut *store) {
                Ok(changes) => foreign_changes.push(changes),
                Err(err) => warn!("Failed to record state of {}: {err}", repository.name()),
            }
        }

        let repositories = repositories
            .into_iter()
            .map(|repository| Box::new(repository) as Box<dyn ForeignRepository>)
            .collect();
        let ctx = self.config.reconcile_context(repositories)?;

        let latest = store.latest()?.map(|(timestamp, _)| timestamp);
        let timestamp = next_check_timestamp(latest, chrono::Utc::now().timestamp());
        let outcome = run_check(
            &ctx,
            &local_packages,
            &self.config.ignored_packages,
            &mut *store,
            timestamp,
        )?;
        info!(
            "{} of {} packages are out of date",
            outcome.record.out_of_date_count, outcome.record.total_package_count
        );

        let history = store.recent_check_records(self.config.history_limit)?;
        let report = Report::new(
            &self.config.distro_name,
            &outcome,
            &local_packages,
            history,
            foreign_changes,
            &*ctx.order,
        );
        output.report(&report)
    }

    fn history_task(&self, limit: Option<usize>) -> Result<()> {
        let store = self.open_store()?;
        let records = store.recent_check_records(limit.unwrap_or(self.config.history_limit))?;
        output_json(&records)
    }

    fn show_task(&self, package: &str) -> Result<()> {
        let store = self.open_store()?;
        let Some((_, snapshot)) = store.latest()? else {
            bail!("No check has been recorded yet");
        };
        let Some(record) = snapshot.package(package) else {
            bail!("Package `{package}` is not part of the latest snapshot");
        };
        output_json(record)
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let ctx = AppContext::new(&args)?;

    match args.command {
        Command::Check {
            templated,
            template_path,
            dry_run,
        } => {
            let output = OutputConfig {
                templated_output: templated,
                template_ctx: TemplateContext::init(template_path)?,
            };
            ctx.check_task(&output, dry_run)
        }
        Command::History { limit } => ctx.history_task(limit),
        Command::Show { package } => ctx.show_task(&package),
    }
}
