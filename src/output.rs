//! Output formatting for aggregated carbon items

use crate::carbon::CarbonResourceItem;
use clap::ValueEnum;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Table};
use jmespath::Expression;
use std::io::{self, Write};

/// Output format for the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Rounded console table, highest emitter first
    #[default]
    Table,
    Json,
    Text,
    Markdown,
    Csv,
}

/// Write `items` in the requested format
///
/// `query` is a compiled JMESPath expression applied to the JSON
/// document; the other formats never receive one.
pub fn write_items<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    format: OutputFormat,
    skip_header: bool,
    query: Option<&Expression<'_>>,
) -> io::Result<()> {
    match format {
        OutputFormat::Table => write_table(out, items, skip_header),
        OutputFormat::Json => write_json(out, items, query),
        OutputFormat::Text => write_text(out, items, skip_header),
        OutputFormat::Markdown => write_markdown(out, items, skip_header),
        OutputFormat::Csv => write_csv(out, items, skip_header),
    }
}

/// Pretty-printed JSON array, or the result of `query` over it
pub fn write_json<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    query: Option<&Expression<'_>>,
) -> io::Result<()> {
    match query {
        None => serde_json::to_writer_pretty(&mut *out, items)?,
        Some(expression) => {
            let document = serde_json::to_value(items)?;
            let result = expression
                .search(document)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
            serde_json::to_writer_pretty(&mut *out, &*result)?;
        }
    }
    writeln!(out)
}

/// Items sorted by carbon, highest first
fn by_carbon_desc(items: &[CarbonResourceItem]) -> Vec<&CarbonResourceItem> {
    let mut sorted: Vec<&CarbonResourceItem> = items.iter().collect();
    sorted.sort_by(|a, b| b.carbon.total_cmp(&a.carbon));
    sorted
}

fn tags_json(item: &CarbonResourceItem) -> String {
    if item.tags.is_empty() {
        return String::new();
    }
    serde_json::to_string(&item.tags).unwrap_or_default()
}

/// Console table with rounded borders, highest emitter first
pub fn write_table<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    skip_header: bool,
) -> io::Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).apply_modifier(UTF8_ROUND_CORNERS);

    if !skip_header {
        table.set_header(vec![
            Cell::new("Resource"),
            Cell::new("Resource Type"),
            Cell::new("Location"),
            Cell::new("Resource group name"),
            Cell::new("Tags"),
            Cell::new("Carbon (kgCO2E)").set_alignment(CellAlignment::Right),
        ]);
    }

    for item in by_carbon_desc(items) {
        table.add_row(vec![
            Cell::new(item.name()),
            Cell::new(&item.resource_type),
            Cell::new(&item.resource_location),
            Cell::new(&item.resource_group_name),
            Cell::new(tags_json(item)),
            Cell::new(format!("{:.2}", item.carbon)).set_alignment(CellAlignment::Right),
        ]);
    }

    writeln!(out, "{table}")
}

/// Tab-separated lines, highest emitter first
pub fn write_text<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    skip_header: bool,
) -> io::Result<()> {
    if !skip_header {
        writeln!(out, "Name\tType\tLocation\tResource Group\tCarbon (kgCO2E)")?;
    }

    for item in by_carbon_desc(items) {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{:.2}",
            item.name(),
            item.resource_type,
            item.resource_location,
            item.resource_group_name,
            item.carbon
        )?;
    }
    Ok(())
}

fn escape_markdown(value: &str) -> String {
    value.replace('|', "\\|")
}

pub fn write_markdown<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    skip_header: bool,
) -> io::Result<()> {
    if !skip_header {
        writeln!(out, "| Name | Type | Location | Resource Group | Carbon (kgCO2E) |")?;
        writeln!(out, "|------|------|----------|----------------|-----------------|")?;
    }

    for item in by_carbon_desc(items) {
        writeln!(
            out,
            "| {} | {} | {} | {} | {:.2} |",
            escape_markdown(item.name()),
            escape_markdown(&item.resource_type),
            escape_markdown(&item.resource_location),
            escape_markdown(&item.resource_group_name),
            item.carbon
        )?;
    }
    Ok(())
}

fn csv_tags(item: &CarbonResourceItem) -> String {
    item.tags
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

/// Comma-separated rows in input order
pub fn write_csv<W: Write>(
    out: &mut W,
    items: &[CarbonResourceItem],
    skip_header: bool,
) -> io::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);

    if !skip_header {
        writer.write_record([
            "Carbon",
            "SubscriptionId",
            "ResourceId",
            "ResourceType",
            "ResourceLocation",
            "ResourceGroupName",
            "PublisherType",
            "ServiceName",
            "ServiceTier",
            "Tags",
        ])?;
    }

    for item in items {
        let carbon = format!("{:.8}", item.carbon);
        let tags = csv_tags(item);
        writer.write_record([
            carbon.as_str(),
            item.subscription_id.as_str(),
            item.resource_id.as_str(),
            item.resource_type.as_str(),
            item.resource_location.as_str(),
            item.resource_group_name.as_str(),
            item.publisher_type.as_str(),
            item.service_name.as_str(),
            item.service_tier.as_str(),
            tags.as_str(),
        ])?;
    }
    writer.flush()
}
