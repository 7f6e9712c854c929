use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use funko_db::client::Client;
use funko_db::cmd::{self, Command};
use funko_db::config::Config;
use funko_db::funko::{Funko, FunkoData, FunkoGenre, FunkoType};
use funko_db::logging::init_logging;

/// Sends one command to a Funko collection server.
#[derive(Parser, Debug)]
#[command(name = "run_client", version)]
struct Cli {
    /// Server address [env: FUNKO_ADDR] [default: 127.0.0.1:60300]
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add a Funko to the list
    Add {
        #[command(flatten)]
        funko: FunkoArgs,
        /// Username of the user
        #[arg(long)]
        user: String,
    },
    /// Modify a Funko from the list
    Update {
        /// ID of the Funko to be modified
        #[arg(long, alias = "funkoID")]
        funko_id: String,
        #[command(flatten)]
        funko: FunkoArgs,
        /// Username of the user
        #[arg(long)]
        user: String,
    },
    /// Remove a Funko from the list
    Remove {
        /// ID of the Funko
        #[arg(long)]
        id: String,
        /// Username of the user
        #[arg(long)]
        user: String,
    },
    /// Show one Funko's data
    Read {
        /// ID of the Funko
        #[arg(long)]
        id: String,
        /// Username of the user
        #[arg(long)]
        user: String,
    },
    /// Show every Funko stored for the user
    List {
        /// Username of the user
        #[arg(long)]
        user: String,
    },
}

#[derive(Args, Debug)]
struct FunkoArgs {
    /// ID of the Funko
    #[arg(long)]
    id: String,
    /// Name of the Funko
    #[arg(long)]
    name: String,
    /// Description of the Funko
    #[arg(long)]
    desc: String,
    /// Type of the Funko (Pop!, Pop! Rides, Vinyl Soda, Vinyl Gold)
    #[arg(long = "type")]
    kind: FunkoType,
    /// Genre of the Funko (Animation, Films and TV, Videogames, Sports, Music, Anime)
    #[arg(long)]
    genre: FunkoGenre,
    /// Franchise of the Funko
    #[arg(long)]
    franchise: String,
    /// Number of the Funko in the franchise
    #[arg(long, alias = "franchiseNumber", allow_negative_numbers = true)]
    franchise_number: f64,
    /// Is the Funko exclusive?
    #[arg(long, alias = "isExclusive", action = clap::ArgAction::Set)]
    is_exclusive: bool,
    /// Special features of the Funko
    #[arg(long, alias = "specialFeatures")]
    special_features: String,
    /// Value of the Funko
    #[arg(long, alias = "marketValue", allow_negative_numbers = true)]
    market_value: f64,
}

impl FunkoArgs {
    fn into_funko(self) -> funko_db::Result<Funko> {
        let funko = Funko::new(FunkoData {
            id: self.id,
            name: self.name,
            desc: self.desc,
            kind: self.kind,
            genre: self.genre,
            franchise: self.franchise,
            franchise_number: self.franchise_number,
            is_exclusive: self.is_exclusive,
            special_features: self.special_features,
            market_value: self.market_value,
        })?;

        Ok(funko)
    }
}

impl Commands {
    fn into_command(self) -> funko_db::Result<Command> {
        let command = match self {
            Commands::Add { funko, user } => Command::Add(cmd::Add::new(user, funko.into_funko()?)),
            Commands::Update {
                funko_id,
                funko,
                user,
            } => Command::Update(cmd::Update::new(user, funko_id, funko.into_funko()?)),
            Commands::Remove { id, user } => Command::Remove(cmd::Remove::new(user, id)),
            Commands::Read { id, user } => Command::Read(cmd::Read::new(user, id)),
            Commands::List { user } => Command::List(cmd::List::new(user)),
        };

        Ok(command)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the server reported success.
async fn run(cli: Cli) -> funko_db::Result<bool> {
    let config = Config::from_env().with_overrides(cli.addr, None);
    let command = cli.command.into_command()?;

    let client = Client::connect(&config.addr).await?;
    let response = client.send(command).await?;

    if let Some(output) = &response.output {
        println!("{}", output);
    }
    if let Some(error) = &response.error {
        eprintln!("{}", error);
    }

    Ok(response.success)
}
