//! Command line definition.

use clap::{Args, Parser, Subcommand};
use schema_importer_core::security::Password;
use schema_importer_core::{ConnectionConfig, ConnectionUpdate, DatabaseKind, ProbeSettings};
use std::path::PathBuf;
use std::time::Duration;

/// Default location of the connection store.
pub(crate) const DEFAULT_STORE: &str = "connections.schema-importer.json";

#[derive(Parser)]
#[command(name = "schema-importer")]
#[command(about = "Validate, test, and introspect source database connections")]
#[command(version)]
#[command(long_about = "
Schema Importer - Source connection validation

Checks that an external MySQL or PostgreSQL table can be imported from:
- The config names every field its database kind requires
- The server accepts the credentials and knows the database
- The table (and, for PostgreSQL, the schema) exists
- The server version is supported
- The user may CREATE in the schema and database (PostgreSQL)

Privilege checks log in with the administrative credentials read from
MYSQL_USER / MYSQL_PASSWORD and POSTGRES_USER / POSTGRES_PASSWORD. When
those are absent, the privilege checks fail.

Results and errors are printed to stdout as JSON.

EXAMPLES:
  schema-importer test --type postgresql --host db --user app \\
      --database sales --schema public --table orders
  schema-importer create --type mysql --host db --user app --database shop --table orders
  schema-importer rows 1 --limit 25
")]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) global: GlobalArgs,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Test a connection and store it if every check passes
    Create(ConnectionArgs),
    /// Test a connection without storing it
    Test(ConnectionArgs),
    /// Re-test a stored connection
    TestExisting(IdArgs),
    /// Change a stored connection; the result must pass every check
    Update(UpdateArgs),
    /// Remove a stored connection
    Delete(IdArgs),
    /// Show a stored connection
    Show(IdArgs),
    /// List stored connections
    List,
    /// List the tables reachable with a stored connection
    Tables(IdArgs),
    /// Show the columns of a stored connection's table
    TableSchema(IdArgs),
    /// Show sample rows of a stored connection's table
    Rows(RowsArgs),
}

#[derive(Args)]
pub(crate) struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub(crate) verbose: u8,

    /// Suppress output
    #[arg(
        short,
        long,
        global = true,
        help = "Suppress all logging except errors"
    )]
    pub(crate) quiet: bool,

    /// Connection store file
    #[arg(
        long,
        global = true,
        env = "SCHEMA_IMPORTER_STORE",
        default_value = DEFAULT_STORE,
        help = "JSON file holding stored connections"
    )]
    pub(crate) store: PathBuf,

    /// Keep connections in memory only
    #[arg(
        long,
        global = true,
        help = "Ignore the store file; stored connections last for this run only"
    )]
    pub(crate) ephemeral: bool,

    /// Connect timeout in seconds
    #[arg(long, global = true, default_value_t = 10, value_name = "SECONDS")]
    pub(crate) connect_timeout: u64,

    /// Query timeout in seconds
    #[arg(long, global = true, default_value_t = 30, value_name = "SECONDS")]
    pub(crate) query_timeout: u64,
}

impl GlobalArgs {
    pub(crate) const fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            query_timeout: Duration::from_secs(self.query_timeout),
        }
    }
}

#[derive(Args)]
pub(crate) struct ConnectionArgs {
    /// Database kind
    #[arg(
        long = "type",
        value_name = "KIND",
        help = "Database kind: mysql or postgresql"
    )]
    pub(crate) kind: DatabaseKind,

    /// Server host
    #[arg(long)]
    pub(crate) host: String,

    /// Server port
    #[arg(long, help = "Server port (defaults to the kind's standard port)")]
    pub(crate) port: Option<u16>,

    /// User to test
    #[arg(long)]
    pub(crate) user: String,

    /// Password of the tested user
    #[arg(
        long,
        env = "SOURCE_PASSWORD",
        hide_env_values = true,
        help = "Password of the tested user (prompted for when absent)"
    )]
    pub(crate) password: Option<String>,

    /// Database name
    #[arg(long)]
    pub(crate) database: String,

    /// Table name
    #[arg(long, default_value = "")]
    pub(crate) table: String,

    /// Schema name (PostgreSQL)
    #[arg(long)]
    pub(crate) schema: Option<String>,
}

impl ConnectionArgs {
    /// Builds the config with `password` in place of the argument.
    pub(crate) fn into_config(self, password: Password) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.kind, self.host)
            .with_database(self.database)
            .with_table(self.table);
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        config.user = self.user;
        config.password = password;
        config.schema = self.schema;
        config
    }
}

#[derive(Args)]
pub(crate) struct IdArgs {
    /// Stored connection id
    pub(crate) id: u64,
}

#[derive(Args)]
pub(crate) struct UpdateArgs {
    /// Stored connection id
    pub(crate) id: u64,

    /// New host
    #[arg(long)]
    pub(crate) host: Option<String>,

    /// New port
    #[arg(long)]
    pub(crate) port: Option<u16>,

    /// New user
    #[arg(long)]
    pub(crate) user: Option<String>,

    /// New password
    #[arg(long, conflicts_with = "ask_password")]
    pub(crate) password: Option<String>,

    /// Prompt for a new password
    #[arg(long)]
    pub(crate) ask_password: bool,

    /// New database
    #[arg(long)]
    pub(crate) database: Option<String>,

    /// New table
    #[arg(long)]
    pub(crate) table: Option<String>,

    /// New schema; an empty value clears it
    #[arg(long)]
    pub(crate) schema: Option<String>,
}

impl UpdateArgs {
    /// Builds the update; `password` replaces the argument when given.
    pub(crate) fn to_update(&self, password: Option<Password>) -> ConnectionUpdate {
        ConnectionUpdate {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: password.or_else(|| self.password.as_deref().map(Password::new)),
            database: self.database.clone(),
            table: self.table.clone(),
            schema: self.schema.clone(),
        }
    }
}

#[derive(Args)]
pub(crate) struct RowsArgs {
    /// Stored connection id
    pub(crate) id: u64,

    /// Number of rows
    #[arg(long, default_value_t = 10, help = "Number of rows to return (1-100)")]
    pub(crate) limit: u32,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use clap::CommandFactory;

    fn argv(args: &str) -> impl Iterator<Item = &str> {
        std::iter::once("schema-importer").chain(args.split_whitespace())
    }

    fn parse(args: &str) -> Cli {
        temp_env::with_vars_unset(["SOURCE_PASSWORD", "SCHEMA_IMPORTER_STORE"], || {
            Cli::try_parse_from(argv(args)).unwrap()
        })
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_postgres() {
        let cli = parse(
            "create --type postgres --host pg.internal --user importer --password s3cret \
             --database sales --schema public --table orders",
        );

        let Command::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.kind, DatabaseKind::PostgreSql);

        let password = Password::new(args.password.clone().unwrap());
        let config = args.into_config(password);
        assert_eq!(config.port, 5432);
        assert_eq!(config.schema_name(), Some("public"));
        assert_eq!(config.password.expose(), "s3cret");
    }

    #[test]
    fn test_table_may_be_omitted_for_validation_to_report() {
        let cli = parse("test --type mysql --host db --user u --database shop");

        let Command::Test(args) = cli.command else {
            panic!("expected test");
        };
        assert!(args.password.is_none());
        let config = args.into_config(Password::default());
        assert_eq!(config.table, "");
        assert_eq!(config.port, 3306);
    }

    #[test]
    fn test_password_from_environment() {
        let cli = temp_env::with_var("SOURCE_PASSWORD", Some("from-env"), || {
            Cli::try_parse_from(argv(
                "test --type mysql --host db --user u --database shop --table orders",
            ))
            .unwrap()
        });

        let Command::Test(args) = cli.command else {
            panic!("expected test");
        };
        assert_eq!(args.password.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let args = "test --type oracle --host db --user u --database x";
        let result = Cli::try_parse_from(argv(args));
        assert!(result.is_err());
    }

    #[test]
    fn test_rows_default_limit_and_globals() {
        let cli = parse("-vv rows 7 --ephemeral --query-timeout 5");

        let Command::Rows(args) = cli.command else {
            panic!("expected rows");
        };
        assert_eq!(args.id, 7);
        assert_eq!(args.limit, 10);
        assert_eq!(cli.global.verbose, 2);
        assert!(cli.global.ephemeral);
        assert_eq!(
            cli.global.probe_settings().query_timeout,
            Duration::from_secs(5)
        );
        assert_eq!(cli.global.store, PathBuf::from(DEFAULT_STORE));
    }

    #[test]
    fn test_update_builds_partial_update() {
        let cli = parse("update 3 --host replica --schema=");

        let Command::Update(args) = cli.command else {
            panic!("expected update");
        };
        let update = args.to_update(None);
        assert_eq!(update.host.as_deref(), Some("replica"));
        assert_eq!(update.schema.as_deref(), Some(""));
        assert!(update.password.is_none());
        assert!(update.table.is_none());
    }

    #[test]
    fn test_update_password_flags_conflict() {
        let result = Cli::try_parse_from(argv("update 3 --password x --ask-password"));
        assert!(result.is_err());
    }
}
