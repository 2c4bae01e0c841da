use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Mapper configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the CREATE TABLE statement of every entity in a definitions file
    Ddl {
        /// JSON array of type definitions
        definitions: PathBuf,

        /// Only print this entity
        #[arg(short, long)]
        entity: Option<String>,
    },

    /// Compare an existing table description with an entity
    Validate {
        /// JSON array of type definitions
        definitions: PathBuf,

        /// Entity stored in the table
        entity: String,

        /// Table description as reported by the store (JSON)
        table: PathBuf,
    },

    /// Compile a method-name query and print the statement and its bindings
    Compile {
        /// JSON array of type definitions
        definitions: PathBuf,

        /// Entity the method queries
        entity: String,

        /// Method name, e.g. findByLastNameOrderByAgeDesc
        method: String,

        /// Arguments as JSON values, consumed positionally
        arguments: Vec<String>,
    },
}
