use std::collections::{BTreeMap, BTreeSet};

use crate::models::{IndicatorKind, IndicatorSeries, PanelLine, PanelRole, PanelSpec, Placement};

/// Computed outputs per indicator kind, in descriptor line order
pub type IndicatorSeriesMap = BTreeMap<IndicatorKind, Vec<IndicatorSeries>>;

/// Lay out the requested indicators as chart panels.
///
/// Panel 0 (price) always comes first and carries every price overlay.
/// Sub-panels follow in `IndicatorKind` order (RSI, MACD, Stochastic) and are
/// numbered consecutively. Kinds without computed series are skipped.
pub fn compose(requested: &BTreeSet<IndicatorKind>, series: &IndicatorSeriesMap) -> Vec<PanelSpec> {
    let mut price = PanelSpec::price();
    let mut sub_panels: Vec<PanelSpec> = Vec::new();

    // BTreeSet iterates in declaration order, which is the panel priority
    for &kind in requested {
        let Some(outputs) = series.get(&kind) else {
            continue;
        };
        let descriptor = kind.descriptor();
        let lines: Vec<PanelLine> = descriptor
            .lines
            .iter()
            .zip(outputs)
            .map(|(style, output)| PanelLine {
                series: output.clone(),
                color: style.color,
                label: style.label,
            })
            .collect();

        match descriptor.placement {
            Placement::PriceOverlay => price.lines.extend(lines),
            Placement::SubPanel => sub_panels.push(PanelSpec {
                index: sub_panels.len() + 1,
                role: PanelRole::SubPanel,
                title: descriptor.name,
                lines,
                bounds: descriptor.bounds,
            }),
        }
    }

    let mut panels = Vec::with_capacity(sub_panels.len() + 1);
    panels.push(price);
    panels.extend(sub_panels);
    panels
}
