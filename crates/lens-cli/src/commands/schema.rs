use lens_core::entities::{AuditRequest, Report, Site};
use schemars::schema_for;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{SchemaArgs, SchemaType};
use crate::output::output;

/// Handle `slens schema`.
pub fn handle(args: &SchemaArgs, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&schema_value(args.type_name)?, flags.format)
}

fn schema_value(type_name: SchemaType) -> anyhow::Result<serde_json::Value> {
    let schema = match type_name {
        SchemaType::Site => schema_for!(Site),
        SchemaType::Report => schema_for!(Report),
        SchemaType::AuditRequest => schema_for!(AuditRequest),
    };
    Ok(serde_json::to_value(schema)?)
}
