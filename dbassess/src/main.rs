//! Database security assessment tool.
//!
//! Inspects the bundled check catalogs, manages datasource profiles, seals
//! catalog resources and plans assessment runs.
//!
//! # Security Guarantees
//! - Datasource passwords are never written to the registry file
//! - Unsealed catalog output is written with owner-only permissions
//! - Connection URLs are redacted before they are printed

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use dbassess_core::{
    AssessmentBuilder, Catalog, Datasource, DatasourceRegistry, DatasourceType, DriverStore,
    Scope, StoreConfig, TestSelection, init_logging,
    models::TestKind,
    persist,
    security::{Credentials, bundle},
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dbassess")]
#[command(about = "Database security assessment catalog and datasource tool")]
#[command(version)]
#[command(long_about = "
dbassess - Database security assessment engine

Loads the encrypted catalogs of predefined security checks, keeps the
datasource profiles to assess, and plans which checks apply to a target.

SECURITY FEATURES:
- Passwords are never persisted
- Decrypted catalogs are private and short-lived
- Connection URLs are redacted in output

EXAMPLES:
  dbassess catalog stats
  dbassess datasource add --name orders --type POSTGRESQL --host db1 --user auditor
  dbassess plan --datasource orders --scope query --category Privilege
  dbassess catalog seal avail_test.xml resources/avail_test.dump
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(flatten)]
    stores: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding the sealed catalog resources
    #[arg(long, global = true, env = "DBASSESS_RESOURCE_DIR")]
    resource_dir: Option<PathBuf>,

    /// Working directory for registries and decrypted files
    #[arg(long, global = true, env = "DBASSESS_WORK_DIR")]
    work_dir: Option<PathBuf>,
}

impl StoreArgs {
    fn config(&self) -> anyhow::Result<StoreConfig> {
        let mut config = StoreConfig::default();
        if let Some(dir) = &self.resource_dir {
            config = config.with_resource_dir(dir);
        }
        if let Some(dir) = &self.work_dir {
            config = config.with_work_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Inspect and prepare catalog resources
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// Manage datasource profiles
    #[command(subcommand)]
    Datasource(DatasourceCommand),
    /// Inspect driver metadata
    #[command(subcommand)]
    Driver(DriverCommand),
    /// Show the tests an assessment of a datasource would run
    Plan(PlanArgs),
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Load every catalog and print row counts
    Stats {
        #[arg(long, help = "Print JSON instead of text")]
        json: bool,
    },
    /// Encrypt a plaintext dump into a catalog resource
    Seal { input: PathBuf, output: PathBuf },
    /// Decrypt a catalog resource into a plaintext dump
    Unseal { input: PathBuf, output: PathBuf },
}

#[derive(Subcommand)]
enum DatasourceCommand {
    /// List saved profiles
    List,
    /// Add a profile, replacing any profile with the same name
    Add(AddArgs),
    /// Remove a profile by name
    Remove { name: String },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    name: String,

    /// Type id or name (for example 15 or POSTGRESQL)
    #[arg(long = "type", value_parser = parse_datasource_type)]
    datasource_type: &'static DatasourceType,

    #[arg(long)]
    host: String,

    /// Defaults to the type's standard port
    #[arg(long, default_value_t = 0)]
    port: u16,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    db_name: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Driver id from `dbassess driver list`
    #[arg(long)]
    driver: Option<i64>,

    /// Driver properties as key=value;key=value
    #[arg(long)]
    properties: Option<String>,
}

#[derive(Subcommand)]
enum DriverCommand {
    /// List drivers, optionally for one datasource type
    List {
        #[arg(long = "type", value_parser = parse_datasource_type)]
        datasource_type: Option<&'static DatasourceType>,
    },
    /// Record that a driver library has been supplied
    Stored { name: String },
}

#[derive(Args)]
struct PlanArgs {
    /// Profile name from `dbassess datasource list`
    #[arg(long)]
    datasource: String,

    /// all, query or cve
    #[arg(long, default_value = "all")]
    scope: Scope,

    #[arg(long)]
    category: Option<String>,

    #[arg(long, help = "Print JSON instead of text")]
    json: bool,
}

fn parse_datasource_type(value: &str) -> Result<&'static DatasourceType, String> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(DatasourceType::by_id)
        .or_else(|| DatasourceType::by_name(value))
        .ok_or_else(|| format!("unknown datasource type '{}'", value))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;
    let config = cli.stores.config()?;

    match cli.command {
        Command::Catalog(command) => catalog_command(&config, command),
        Command::Datasource(command) => datasource_command(&config, command),
        Command::Driver(command) => driver_command(&config, command),
        Command::Plan(args) => plan(&config, &args),
    }
}

fn catalog_command(config: &StoreConfig, command: CatalogCommand) -> anyhow::Result<()> {
    match command {
        CatalogCommand::Stats { json } => {
            let stats = Catalog::from_config(config).stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Available tests:   {}", stats.tests);
                println!("SQL definitions:   {}", stats.definitions);
                println!("CVE fixes:         {}", stats.cve_fixes);
                println!("CVE references:    {}", stats.cve_references);
                println!("Exception groups:  {}", stats.groups);
                println!("Group members:     {}", stats.group_members);
                println!("Full-detail tests: {}", stats.full_detail_tests);
            }
            if stats.tests == 0 {
                warn!(
                    "No available tests loaded from {}",
                    config.resource_dir.display()
                );
            }
            Ok(())
        }
        CatalogCommand::Seal { input, output } => seal_file(&input, &output),
        CatalogCommand::Unseal { input, output } => unseal_file(&input, &output),
    }
}

fn seal_file(input: &Path, output: &Path) -> anyhow::Result<()> {
    let plaintext =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    if dbassess_core::dump::decode(&plaintext).is_empty() {
        warn!("{} holds no dump tables", input.display());
    }
    std::fs::write(output, bundle::seal(&plaintext))
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Sealed {} into {}", input.display(), output.display());
    Ok(())
}

fn unseal_file(input: &Path, output: &Path) -> anyhow::Result<()> {
    let sealed = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let plaintext = bundle::unseal(&sealed)?;
    let text = std::str::from_utf8(&plaintext)
        .with_context(|| format!("{} does not hold a text dump", input.display()))?;
    persist::write_atomic(output, text, "unsealed catalog")?;
    info!("Unsealed {} into {}", input.display(), output.display());
    Ok(())
}

fn datasource_command(config: &StoreConfig, command: DatasourceCommand) -> anyhow::Result<()> {
    let mut registry = DatasourceRegistry::open(config)?;
    match command {
        DatasourceCommand::List => {
            if registry.is_empty() {
                println!("No datasources configured");
            }
            for datasource in registry.list() {
                println!("{:>6}  {}", datasource.id, datasource);
            }
            Ok(())
        }
        DatasourceCommand::Add(args) => {
            let id = registry.add(datasource_from_args(args));
            registry.save()?;
            println!("Saved datasource {}", id);
            Ok(())
        }
        DatasourceCommand::Remove { name } => {
            if registry.remove_by_name(&name).is_none() {
                bail!("no datasource named '{}'", name);
            }
            registry.save()?;
            println!("Removed datasource '{}'", name);
            Ok(())
        }
    }
}

fn datasource_from_args(args: AddArgs) -> Datasource {
    let mut datasource = Datasource::new(args.name, args.datasource_type.id, args.host, args.port);
    if let Some(user) = args.user {
        datasource = datasource.with_credentials(Credentials::new(user, None));
    }
    if let Some(db_name) = args.db_name {
        datasource = datasource.with_db_name(db_name);
    }
    if let Some(description) = args.description {
        datasource = datasource.with_description(description);
    }
    if let Some(driver) = args.driver {
        datasource = datasource.with_driver(driver);
    }
    if let Some(properties) = args.properties {
        datasource = datasource.with_connection_properties(properties);
    }
    datasource
}

fn driver_command(config: &StoreConfig, command: DriverCommand) -> anyhow::Result<()> {
    let catalog = Catalog::from_config(config);
    let mut drivers = DriverStore::load(&catalog, config);
    match command {
        DriverCommand::List { datasource_type } => {
            let listed: Vec<_> = match datasource_type {
                Some(t) => drivers.by_type(t.id),
                None => drivers.iter().collect(),
            };
            for driver in listed {
                println!(
                    "{:>4}  {:<32} type {:<3} {}",
                    driver.id,
                    driver.name,
                    driver.datasource_type_id,
                    if driver.driver_stored { "stored" } else { "" }
                );
            }
            Ok(())
        }
        DriverCommand::Stored { name } => {
            if !drivers.mark_stored(&name)? {
                bail!("no driver named '{}'", name);
            }
            println!("Marked '{}' as stored", name);
            Ok(())
        }
    }
}

/// Planned run-set, as printed by `dbassess plan --json`.
#[derive(Serialize)]
struct Plan<'a> {
    datasource: &'a str,
    assessment: &'a str,
    tests: Vec<PlannedTest<'a>>,
}

#[derive(Serialize)]
struct PlannedTest<'a> {
    test_id: i64,
    kind: TestKind,
    severity: &'a str,
    category: &'a str,
    description: &'a str,
    cve_fixes: usize,
}

fn plan(config: &StoreConfig, args: &PlanArgs) -> anyhow::Result<()> {
    let registry = DatasourceRegistry::open(config)?;
    let Some(datasource) = registry.by_name(&args.datasource) else {
        bail!("no datasource named '{}'", args.datasource);
    };

    let catalog = Catalog::from_config(config);
    let mut selection = TestSelection::all().with_scope(args.scope);
    if let Some(category) = &args.category {
        selection = selection.with_category(category.as_str());
    }

    let assessment = AssessmentBuilder::new(&catalog).build(datasource, &selection)?;
    let plan = Plan {
        datasource: &datasource.name,
        assessment: &assessment.description,
        tests: assessment
            .tests
            .iter()
            .map(|t| PlannedTest {
                test_id: t.test_id(),
                kind: t.kind(),
                severity: t.severity.as_str(),
                category: &t.test.category_name,
                description: &t.test.description,
                cve_fixes: t.cve_fixes.len(),
            })
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{} ({} tests)", plan.assessment, plan.tests.len());
        for test in &plan.tests {
            println!(
                "{:>6}  {:<5} {:<8} {:<24} {}",
                test.test_id, test.kind, test.severity, test.category, test.description
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbassess_core::catalog::names;
    use dbassess_core::dump::{EscapePolicy, Row, encode_table};

    fn config(dir: &Path) -> StoreConfig {
        StoreConfig::new(dir.join("resources")).with_work_dir(dir.join("work"))
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dbassess",
            "datasource",
            "list",
            "-vv",
            "--work-dir",
            "/tmp/w",
        ])
        .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.stores.work_dir, Some(PathBuf::from("/tmp/w")));
    }

    #[test]
    fn test_datasource_type_by_id_or_name() {
        assert_eq!(parse_datasource_type("15").map(|t| t.id), Ok(15));
        assert_eq!(parse_datasource_type("postgresql").map(|t| t.id), Ok(15));
        assert!(parse_datasource_type("dbase").is_err());
    }

    #[test]
    fn test_plan_scope_parses() {
        let cli = Cli::try_parse_from(["dbassess", "plan", "--datasource", "x", "--scope", "cve"])
            .unwrap();
        match cli.command {
            Command::Plan(args) => assert_eq!(args.scope, Scope::CveOnly),
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn test_datasource_add_and_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let cli = Cli::try_parse_from([
            "dbassess", "datasource", "add", "--name", "orders", "--type", "POSTGRESQL",
            "--host", "db1", "--user", "auditor",
        ])
        .unwrap();
        let Command::Datasource(command) = cli.command else {
            panic!("expected datasource command");
        };
        datasource_command(&config, command).unwrap();

        let registry = DatasourceRegistry::open(&config).unwrap();
        let ds = registry.by_name("orders").unwrap();
        assert_eq!(ds.port, 5432);
        assert_eq!(ds.credentials.username(), "auditor");

        datasource_command(
            &config,
            DatasourceCommand::Remove {
                name: "orders".to_string(),
            },
        )
        .unwrap();
        assert!(DatasourceRegistry::open(&config).unwrap().is_empty());

        assert!(
            datasource_command(
                &config,
                DatasourceCommand::Remove {
                    name: "orders".to_string()
                }
            )
            .is_err()
        );
    }

    #[test]
    fn test_seal_unseal_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("avail_test.xml");
        let sealed = dir.path().join("avail_test.dump");
        let back = dir.path().join("avail_test.out");

        let document = encode_table(
            names::AVAIL_TEST_TABLE,
            &[Row::new().with("test_id", "2001")],
            EscapePolicy::Uniform,
        );
        std::fs::write(&plain, &document).unwrap();

        seal_file(&plain, &sealed).unwrap();
        assert_ne!(std::fs::read(&sealed).unwrap(), document.as_bytes());
        unseal_file(&sealed, &back).unwrap();
        assert_eq!(std::fs::read_to_string(&back).unwrap(), document);
    }

    #[test]
    fn test_plan_without_catalog_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut registry = DatasourceRegistry::open(&config).unwrap();
        registry.add(Datasource::new("orders", 15, "db1", 0));
        registry.save().unwrap();

        let args = PlanArgs {
            datasource: "orders".to_string(),
            scope: Scope::All,
            category: None,
            json: false,
        };
        let err = plan(&config, &args).unwrap_err();
        assert!(err.to_string().contains("No tests to run"));
    }
}
