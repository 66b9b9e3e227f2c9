//! Country policy: which sources may answer for a market, and in what order.

use crate::models::{Market, SourceChoice, SourceId, SourceSelection};

const USA_DEFAULT_ORDER: [SourceId; 4] = [
    SourceId::YFinance,
    SourceId::Nasdaq,
    SourceId::AlphaVantage,
    SourceId::Nyse,
];

const INDIA_DEFAULT_ORDER: [SourceId; 4] = [
    SourceId::YFinance,
    SourceId::Nse,
    SourceId::Bse,
    SourceId::AlphaVantage,
];

/// The fixed order `auto` expands to for `market`.
pub fn default_order(market: Market) -> &'static [SourceId] {
    match market {
        Market::Usa => &USA_DEFAULT_ORDER,
        Market::India => &INDIA_DEFAULT_ORDER,
    }
}

/// Ordered list of sources to try for `market`.
///
/// `auto` expands in place to [`default_order`]. Explicit sources keep the
/// caller's order. Sources that do not serve the market are dropped without
/// error, and a source never appears twice.
pub fn eligible_sources(market: Market, selection: &SourceSelection) -> Vec<SourceId> {
    let mut ordered: Vec<SourceId> = Vec::new();
    let mut push = |id: SourceId| {
        if id.serves(market) && !ordered.contains(&id) {
            ordered.push(id);
        }
    };

    for choice in selection.choices() {
        match choice {
            SourceChoice::Auto => default_order(market).iter().copied().for_each(&mut push),
            SourceChoice::Source(id) => push(*id),
        }
    }

    ordered
}
