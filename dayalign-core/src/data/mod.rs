//! Source ingest and table encodings

pub mod encode;
pub mod ingest;
pub mod schema;

pub use encode::{
    read_csv, read_csv_file, read_parquet, table_to_csv_string, write_csv, write_csv_file,
    write_parquet, EncodeError,
};
pub use ingest::{DataIngestor, IngestError};
pub use schema::{SchemaError, TableSchema, DATE_COLUMN};
