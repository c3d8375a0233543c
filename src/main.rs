use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mongo_database::document::{document_from_json, document_to_json};
use mongo_database::{
    ConfigLoader, FindOptions, GeoNearOptions, Geolocation, LogConfig, MongoDatabase, OrderBy,
    SortOrder,
};
use mongodb::bson::Document;
use serde_json::{json, Value as JsonValue};

#[derive(Parser, Debug)]
#[command(name = "mongo-database", version, about = "Query MongoDB collections with `id`-shaped records")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Connection string, overrides the configuration file
    #[arg(long, env = "MONGO_DATABASE_STORE_URL")]
    url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find every matching record
    Find {
        collection: String,
        /// Criteria as a JSON object
        #[arg(default_value = "{}")]
        criteria: String,
        /// Field to order by
        #[arg(long)]
        order_by: Option<String>,
        /// Order direction (asc or desc)
        #[arg(long, default_value = "asc")]
        order: String,
    },
    /// Find the first matching record
    FindOne { collection: String, criteria: String },
    /// Count matching records
    Count {
        collection: String,
        #[arg(default_value = "{}")]
        criteria: String,
    },
    /// Insert a record
    Add { collection: String, document: String },
    /// Set fields on the first matching record
    Update {
        collection: String,
        criteria: String,
        update: String,
        #[arg(long)]
        upsert: bool,
    },
    /// Delete the first matching record
    Delete { collection: String, criteria: String },
    /// Create an index from native index keys
    CreateIndex { collection: String, index: String },
    /// Records near a point, nearest first
    Near {
        collection: String,
        longitude: f64,
        latitude: f64,
        #[arg(long)]
        max_distance: Option<f64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        spherical: bool,
    },
    /// Drop the whole database
    Drop,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new()
        .load_from_file(cli.config.as_deref())
        .load_from_env()
        .store_url(cli.url.clone())
        .log_level(cli.log_level.clone())
        .build()?;
    config.logger = Some(
        LogConfig::new(config.log_level)
            .with_json(cli.log_json)
            .build_dispatch(),
    );

    let database: MongoDatabase = MongoDatabase::new(config)?;
    database.initialize().await?;

    let output = run(&database, cli.command).await;
    database.close().await?;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

async fn run(database: &MongoDatabase, command: Command) -> Result<JsonValue> {
    let output = match command {
        Command::Find {
            collection,
            criteria,
            order_by,
            order,
        } => {
            let options = order_by.map(|key| {
                FindOptions::order_by(OrderBy {
                    key,
                    order: SortOrder::from(order.as_str()),
                })
            });
            let records = database
                .find_all(&collection, Some(parse(&criteria)?), options)
                .await?;
            JsonValue::Array(records.into_iter().map(document_to_json).collect())
        }
        Command::FindOne {
            collection,
            criteria,
        } => database
            .find_first(&collection, parse(&criteria)?)
            .await?
            .map(document_to_json)
            .unwrap_or(JsonValue::Null),
        Command::Count {
            collection,
            criteria,
        } => json!(database.count(&collection, parse(&criteria)?).await?),
        Command::Add {
            collection,
            document,
        } => {
            let ack = database.add(&collection, parse(&document)?).await?;
            json!({ "insertedId": ack.inserted_id.into_relaxed_extjson() })
        }
        Command::Update {
            collection,
            criteria,
            update,
            upsert,
        } => {
            let ack = database
                .update_first_with(
                    &collection,
                    parse(&criteria)?,
                    parse(&update)?,
                    mongo_database::WriteOptions { upsert },
                )
                .await?;
            json!({
                "matchedCount": ack.matched_count,
                "modifiedCount": ack.modified_count,
                "upsertedId": ack.upserted_id.map(|id| id.into_relaxed_extjson()),
            })
        }
        Command::Delete {
            collection,
            criteria,
        } => {
            let ack = database
                .delete_first(&collection, parse(&criteria)?)
                .await?;
            json!({ "deletedCount": ack.deleted_count })
        }
        Command::CreateIndex { collection, index } => {
            let name = database.create_index(&collection, parse(&index)?).await?;
            json!({ "name": name })
        }
        Command::Near {
            collection,
            longitude,
            latitude,
            max_distance,
            limit,
            spherical,
        } => {
            let options = GeoNearOptions {
                max_distance,
                limit,
                spherical,
                ..GeoNearOptions::default()
            };
            let hits = database
                .find_near(&collection, Geolocation::new(longitude, latitude), options)
                .await?;
            JsonValue::Array(
                hits.into_iter()
                    .map(|hit| {
                        json!({
                            "distance": hit.distance,
                            "document": document_to_json(hit.document),
                        })
                    })
                    .collect(),
            )
        }
        Command::Drop => {
            database.drop().await?;
            json!({ "dropped": true })
        }
    };
    Ok(output)
}

fn parse(raw: &str) -> Result<Document> {
    let json: JsonValue =
        serde_json::from_str(raw).with_context(|| format!("Invalid JSON argument: {}", raw))?;
    Ok(document_from_json(json)?)
}
