//! `blk info`: where the data lives and how the service is configured.


use blocklist_core::BlockError;
use blocklist_core::store::sqlite::{store_created_at_us, store_schema_version};
use serde::Serialize;

use crate::cmd::Context;
use crate::cmd::list::format_us;
use crate::output::{pretty_kv, pretty_section, render_mode};

#[derive(Debug, Serialize)]
struct InfoOutput {
    db_path: String,
    schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at_us: Option<i64>,
    cache_namespace: String,
    cache_ttl_secs: u64,
    dispatch_events: bool,
}

pub fn run_info(ctx: &Context) -> anyhow::Result<()> {
    let svc = ctx.open_service()?;
    let fail = |err| ctx.fail(&BlockError::Storage(err));

    let result = InfoOutput {
        db_path: ctx.db_path.display().to_string(),
        schema_version: store_schema_version(svc.store()).map_err(fail)?,
        created_at_us: store_created_at_us(svc.store()).map_err(fail)?,
        cache_namespace: svc.cache().namespace().to_string(),
        cache_ttl_secs: svc.config().cache_ttl_default.as_secs(),
        dispatch_events: svc.config().dispatch_events,
    };

    render_mode(
        ctx.output,
        &result,
        |r, w| {
            writeln!(w, "db_path\t{}", r.db_path)?;
            writeln!(w, "schema_version\t{}", r.schema_version)?;
            writeln!(w, "cache_namespace\t{}", r.cache_namespace)?;
            writeln!(w, "cache_ttl_secs\t{}", r.cache_ttl_secs)?;
            writeln!(w, "dispatch_events\t{}", r.dispatch_events)
        },
        |r, w| {
            pretty_section(w, "blocklist")?;
            pretty_kv(w, "database", &r.db_path)?;
            pretty_kv(w, "schema", r.schema_version.to_string())?;
            if let Some(us) = r.created_at_us {
                pretty_kv(w, "created", format_us(us))?;
            }
            pretty_kv(w, "cache", format!("{} (ttl {}s)", r.cache_namespace, r.cache_ttl_secs))?;
            pretty_kv(w, "events", if r.dispatch_events { "on" } else { "off" })
        },
    )
}
