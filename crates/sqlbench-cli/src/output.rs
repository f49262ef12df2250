//! Terminal rendering of session state

use chrono::{DateTime, Utc};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use sqlbench_core::{DataSource, DataSourceTab, SqlScript, Tab, TabKind};
use sqlbench_session::SessionSnapshot;
use sqlbench_versioning::ScriptVersion;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Human readable title of a tab
pub fn tab_title(tab: &Tab, snapshot: &SessionSnapshot) -> String {
    match &tab.kind {
        TabKind::Script(script) => snapshot
            .sql_scripts
            .get(&script.sql_script_id)
            .map(|script| script.name.clone())
            .unwrap_or_else(|| "<missing script>".to_string()),
        TabKind::DataSource(DataSourceTab::File { data_source_id }) => snapshot
            .data_sources
            .get(data_source_id)
            .map(|source| source.sql_name().to_string())
            .unwrap_or_else(|| "<missing file>".to_string()),
        TabKind::DataSource(DataSourceTab::Db {
            data_source_id,
            schema_name,
            object_name,
            ..
        }) => {
            let database = snapshot
                .data_sources
                .get(data_source_id)
                .map(DataSource::sql_name)
                .unwrap_or("?");
            format!("{}.{}.{}", database, schema_name, object_name)
        }
        TabKind::SchemaBrowser(browser) => match (&browser.source_id, &browser.schema_name) {
            (Some(source), Some(schema)) => format!("schema browser: {}.{}", source, schema),
            (Some(source), None) => format!("schema browser: {}", source),
            _ => "schema browser".to_string(),
        },
        TabKind::Comparison(comparison) => comparison.name.clone(),
    }
}

fn tab_flags(tab: &Tab, snapshot: &SessionSnapshot) -> String {
    let mut flags = Vec::new();
    if snapshot.active_tab_id.as_ref() == Some(&tab.id) {
        flags.push("active");
    }
    if snapshot.preview_tab_id.as_ref() == Some(&tab.id) {
        flags.push("preview");
    }
    if snapshot.tab_execution_errors.contains_key(&tab.id) {
        flags.push("error");
    }
    flags.join(", ")
}

pub fn tabs_table(snapshot: &SessionSnapshot) -> Table {
    let mut table = new_table(vec!["#", "Id", "Kind", "Title", ""]);
    for (position, tab) in snapshot.ordered_tabs().enumerate() {
        table.add_row(vec![
            (position + 1).to_string(),
            tab.id.to_string(),
            tab.kind.name().to_string(),
            tab_title(tab, snapshot),
            tab_flags(tab, snapshot),
        ]);
    }
    table
}

pub fn scripts_table(scripts: &[SqlScript], snapshot: &SessionSnapshot) -> Table {
    let mut table = new_table(vec!["Id", "Name", "Lines", "Last used"]);
    for script in scripts {
        let last_used = snapshot.access_times.scripts.get(&script.id);
        table.add_row(vec![
            script.id.to_string(),
            script.name.clone(),
            script.content.lines().count().to_string(),
            format_time(last_used),
        ]);
    }
    table
}

pub fn data_sources_table(sources: &[DataSource]) -> Table {
    let mut table = new_table(vec!["Id", "Name", "Kind"]);
    for source in sources {
        let kind = match source {
            DataSource::FlatFile { file_type, .. } => format!("file ({:?})", file_type).to_lowercase(),
            DataSource::Database { kind, .. } => format!("database ({:?})", kind).to_lowercase(),
        };
        table.add_row(vec![source.id().to_string(), source.sql_name().to_string(), kind]);
    }
    table
}

pub fn versions_table(versions: &[ScriptVersion]) -> Table {
    let mut table = new_table(vec!["Version", "Created", "Origin", "Label", "Lines"]);
    for version in versions {
        table.add_row(vec![
            version.short_id(),
            format_time(Some(&version.created_at)),
            version.origin.as_str().to_string(),
            version.label.clone().unwrap_or_default(),
            version.content.lines().count().to_string(),
        ]);
    }
    table
}

fn format_time(at: Option<&DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}
