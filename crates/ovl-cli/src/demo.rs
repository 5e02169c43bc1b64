//! Walkthrough of the overlay lifecycle against an in-memory store

use anyhow::{Context, Result};
use ovl_engine::prelude::*;
use ovl_engine::{OrderReport, OverlayRow};
use serde::Serialize;
use std::sync::Arc;

/// One labelled snapshot of the demo
#[derive(Debug, Serialize)]
pub(crate) struct Step {
    pub(crate) title: &'static str,
    pub(crate) origin: Vec<String>,
    pub(crate) overlay: Vec<OverlayRow<Header>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DemoReport {
    pub(crate) origin_example: ExampleId,
    pub(crate) delta_example: ExampleId,
    pub(crate) steps: Vec<Step>,
    pub(crate) origin_check: OrderReport,
    pub(crate) delta_check: OrderReport,
}

impl DemoReport {
    pub(crate) fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("origin example: {}\n", self.origin_example));
        out.push_str(&format!("delta example:  {}\n", self.delta_example));
        for step in &self.steps {
            out.push_str(&format!("\n== {}\n", step.title));
            out.push_str(&format!("  origin:  [{}]\n", step.origin.join(", ")));
            out.push_str("  overlay:\n");
            for row in &step.overlay {
                out.push_str(&format!(
                    "    {:<6} {} = {}\n",
                    row.source, row.fields.key, row.fields.value
                ));
            }
        }
        out.push_str(&format!(
            "\nintegrity: origin {} rows (v{}), delta {} rows (v{})\n",
            self.origin_check.count,
            self.origin_check.version,
            self.delta_check.count,
            self.delta_check.version
        ));
        out
    }
}

async fn origin_keys(engine: &OverlayEngine, example: ExampleId) -> Result<Vec<String>> {
    Ok(engine
        .headers
        .list(example)
        .await?
        .into_iter()
        .map(|item| item.fields.key)
        .collect())
}

fn find<'a>(rows: &'a [OverlayRow<Header>], key: &str) -> Result<&'a OverlayRow<Header>> {
    rows.iter()
        .find(|row| row.fields.key == key)
        .with_context(|| format!("overlay has no row {key}"))
}

/// Run the scenario and collect a snapshot after each step
pub(crate) async fn run(config: &EngineConfig) -> Result<DemoReport> {
    let registry = Arc::new(ExampleRegistry::new());
    let engine = OverlayEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::clone(&registry) as Arc<dyn ExampleResolver>,
        config,
    );
    let origin = registry.create_example();
    let delta = registry.create_example();
    let mut steps = Vec::new();

    for n in 1..=4 {
        engine
            .headers
            .create(origin, KeyValueFields::new(format!("H{n}"), format!("origin-{n}")))
            .await?;
    }

    let rows = engine.headers.delta_list(delta, origin).await?;
    steps.push(Step {
        title: "first overlay read materializes counterparts",
        origin: origin_keys(&engine, origin).await?,
        overlay: rows.clone(),
    });

    let h1 = find(&rows, "H1")?.id;
    let h4 = find(&rows, "H4")?.id;
    engine
        .headers
        .delta_move(delta, h4, h1, Position::After)
        .await?;
    steps.push(Step {
        title: "move H4 after H1 in the delta example",
        origin: origin_keys(&engine, origin).await?,
        overlay: engine.headers.delta_list(delta, origin).await?,
    });

    engine
        .headers
        .delta_update(h1, KeyValuePatch::value("delta-1"))
        .await?;
    steps.push(Step {
        title: "customize H1 in the delta example",
        origin: origin_keys(&engine, origin).await?,
        overlay: engine.headers.delta_list(delta, origin).await?,
    });

    let origin_h2 = engine
        .headers
        .list(origin)
        .await?
        .into_iter()
        .find(|item| item.fields.key == "H2")
        .context("origin has no H2")?;
    engine
        .headers
        .update(origin_h2.id, KeyValuePatch::value("origin-2b"))
        .await?;
    steps.push(Step {
        title: "edit H2 in the origin example (propagates to the pristine counterpart)",
        origin: origin_keys(&engine, origin).await?,
        overlay: engine.headers.delta_list(delta, origin).await?,
    });

    engine.headers.delta_reset(h1).await?;
    steps.push(Step {
        title: "reset H1 in the delta example",
        origin: origin_keys(&engine, origin).await?,
        overlay: engine.headers.delta_list(delta, origin).await?,
    });

    Ok(DemoReport {
        origin_example: origin,
        delta_example: delta,
        steps,
        origin_check: engine.headers.verify_example(origin).await?,
        delta_check: engine.headers.verify_example(delta).await?,
    })
}
