use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result as AnyResult;
use itertools::Itertools;
use smc_path::PathExt;
use smc_tracing::TapExt;
use tracing::debug;

use smcpkg::PackageManager;
use smcpkg::ResourceRoots;

/// Inspect SMC packages and the resources they provide.
#[ derive( clap::Parser, Debug ) ]
#[ command( version ) ]
struct CliOpts {
    /// User data directory. Defaults to "smc" in the XDG data directory.
    #[ arg( long, value_name="PATH", env="SMC_USER_DATA", global=true ) ]
    user_data: Option<PathBuf>,
    /// Game data directory.
    #[ arg( long, value_name="PATH", env="SMC_GAME_DATA", global=true,
        default_value="/usr/share/smc" ) ]
    game_data: PathBuf,
    /// Savegame directory. Defaults to "savegames" in the user data directory.
    #[ arg( long, value_name="PATH", env="SMC_SAVEGAMES", global=true ) ]
    savegames: Option<PathBuf>,
    /// Screenshot directory. Defaults to "screenshots" in the user
    /// data directory.
    #[ arg( long, value_name="PATH", env="SMC_SCREENSHOTS", global=true ) ]
    screenshots: Option<PathBuf>,
    /// Package to select.
    #[ arg( long, short, value_name="NAME", env="SMC_PACKAGE", global=true ) ]
    package: Option<String>,
    /// More logs, repeat for even more.
    #[ arg( long, short, action=clap::ArgAction::Count, global=true ) ]
    verbose: u8,
    #[ command( subcommand ) ]
    command: Command,
}

#[ derive( clap::Subcommand, Debug ) ]
enum Command {
    /// List installed packages.
    List {
        /// Include hidden packages.
        #[ arg( long, short ) ]
        all: bool,
    },
    /// Show the details of one package.
    Show {
        name: String,
    },
    /// Print the search path of the selected package.
    SearchPath,
    /// Resolve a resource, e.g. `find pixmaps ground/grass.png --ext settings`.
    Find {
        /// Category directory, like "pixmaps", "sounds" or "music".
        category: String,
        resource: String,
        /// Fallback extensions tried in each search path entry.
        #[ arg( long="ext", value_name="EXT" ) ]
        extensions: Vec<String>,
    },
    /// Print an absolute resource path relative to its search path entry.
    Relative {
        category: String,
        path: PathBuf,
    },
    /// Create the user directories of the selected package.
    Init,
}

impl CliOpts {
    fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    #[ tracing::instrument( skip_all ) ]
    fn resource_roots( &self ) -> AnyResult<ResourceRoots> {
        let user_data = match &self.user_data {
            Some( it ) => it.clone(),
            None => {
                use etcetera::choose_base_strategy;
                use etcetera::BaseStrategy;
                debug!( "Find XDG data dir" );
                choose_base_strategy()
                    .context( "Failed to find XDG dirs" )?
                    .data_dir()
                    .join( "smc" )
            },
        };

        let mut roots =
            ResourceRoots::with_defaults( user_data, self.game_data.clone() );
        if let Some( it ) = &self.savegames {
            roots.user_savegame.clone_from( it );
        }
        if let Some( it ) = &self.screenshots {
            roots.user_screenshot.clone_from( it );
        }
        Ok( roots.tap_trace() )
    }
}

struct App {
    manager: PackageManager,
}

impl App {
    #[ tracing::instrument( name = "App::new", skip_all ) ]
    fn new( cliopts: &CliOpts ) -> AnyResult<Self> {
        let roots = cliopts.resource_roots()
            .context( "Failed to determine data directories" )?;

        let mut manager = PackageManager::new( roots );

        if let Some( package ) = &cliopts.package
            && !manager.select_package( Some( package ) )
        {
            bail!( r#"No package named "{package}""# );
        }

        Ok( Self { manager } )
    }

    #[ tracing::instrument( name = "App::run", skip_all ) ]
    fn run( mut self, command: Command ) -> AnyResult<()> {
        match command {
            Command::List { all } => self.list( all ),
            Command::Show { name } => self.show( &name )?,
            Command::SearchPath => {
                for entry in self.manager.search_path() {
                    println!( "{}", entry.display() );
                }
            },
            Command::Find { category, resource, extensions } => {
                let Some( found ) = self.manager
                    .find_reading_path( &category, &resource, &extensions )
                else {
                    bail!( r#"Resource "{resource}" not found in {category}"# );
                };
                println!( "{}", found.display() );
            },
            Command::Relative { category, path } => {
                path.must_absolute()?;
                let Some( relative ) = self.manager
                    .find_relative_path( &category, &path )
                else {
                    bail!( r#""{}" is not below any {category} directory"#,
                        path.display() );
                };
                println!( "{}", relative.display() );
            },
            Command::Init => {
                let current = self.manager.current_package()
                    .map( str::to_owned );
                self.manager.set_current_package( current.as_deref() )
                    .context( "Failed to create user directories" )?;
                for dir in [
                    self.manager.user_level_path(),
                    self.manager.user_campaign_path(),
                    self.manager.user_world_path(),
                    Some( self.manager.user_savegame_path() ),
                    Some( self.manager.user_screenshot_path() ),
                ].into_iter().flatten() {
                    println!( "{}", dir.display() );
                }
            },
        }
        Ok(())
    }

    fn list( &self, all: bool ) {
        let packages = if all {
            self.manager.packages()
        } else {
            self.manager.visible_packages()
        };
        for package in packages {
            let hidden = if package.hidden() { " (hidden)" } else { "" };
            if package.desc().is_empty() {
                println!( "{}{hidden}", package.name() );
            } else {
                println!( "{}{hidden}\t{}", package.name(), package.desc() );
            }
        }
        for skipped in self.manager.skipped() {
            use std::error::Error;
            let chain = std::iter::successors(
                Some( &skipped.error as &( dyn Error + 'static ) ),
                |it| ( *it ).source(),
            ).join( ": " );
            eprintln!( "skipped {}: {chain}", skipped.name );
        }
    }

    fn show( &self, name: &str ) -> AnyResult<()> {
        let Some( package ) = self.manager.package( name ) else {
            bail!( r#"No package named "{name}""# );
        };
        println!( "name: {}", package.name() );
        println!( "description: {}", package.desc() );
        println!( "hidden: {}", package.hidden() );
        println!( "uses: {}", package.dependencies().iter().join( ", " ) );
        println!( "user data: {}", package.user_data_dir().display() );
        println!( "game data: {}", package.game_data_dir().display() );
        Ok(())
    }
}

/// Print the error chain and exit on failure.
trait ResultExt<OK> {
    fn print_error_exit_process( self ) -> OK;
}

impl<OK> ResultExt<OK> for AnyResult<OK> {
    fn print_error_exit_process( self ) -> OK {
        match self {
            Ok( it ) => it,
            Err( err ) => {
                eprintln!( "Error: {err:?}" );
                std::process::exit( 1 )
            },
        }
    }
}

fn main() {
    fn main_but_result( cliopts: CliOpts ) -> AnyResult<()> {
        let app = App::new( &cliopts )
            .context( "Failed to construct app" )?;
        app.run( cliopts.command )
            .context( "Error ocurred when running app" )?;
        Ok(())
    }

    let cliopts = CliOpts::parse();

    smc_tracing::init_tracing_subscriber(
        smc_tracing::level_from_verbosity( cliopts.verbose )
    );

    debug!( ?cliopts );

    main_but_result( cliopts ).print_error_exit_process();
}
