use std::collections::{BTreeMap, HashMap};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

use crate::store::Store;

const TOP_ITEMS: usize = 50;

/// Aggregate spending statistics computed over the stored analysis records.
/// The model output is free text, so every field is read defensively: an
/// unparsable total counts as 0.0 and an unparsable date lands in the
/// "unknown" bucket.
#[derive(Debug, Serialize)]
pub struct Analytics {
    pub overall: Overall,
    pub totals_by_year: BTreeMap<String, f64>,
    pub totals_by_month: BTreeMap<String, f64>,
    pub top_items: Vec<ItemCount>,
}

#[derive(Debug, Serialize)]
pub struct Overall {
    pub count: usize,
    pub total_spent: f64,
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct ItemCount {
    pub name: String,
    pub count: usize,
}

/// Reads every analysis record, aggregates it and prints a short summary
/// followed by the full analytics JSON.
pub fn run(store: &Store) -> anyhow::Result<()> {
    let analyses = store
        .read_all_analyses()
        .context("could not read analysis records")?;
    let receipts: Vec<Value> = analyses
        .iter()
        .filter_map(|text| serde_json::from_str(text).ok())
        .collect();
    if receipts.len() < analyses.len() {
        warn!(
            "{} of {} analysis records were not parseable JSON and were skipped",
            analyses.len() - receipts.len(),
            analyses.len()
        );
    }

    let analytics = generate(&receipts);

    println!();
    println!("Receipts analytics summary");
    println!("Total receipts: {}", analytics.overall.count);
    println!("Total spent: {:.2}", analytics.overall.total_spent);
    println!("Average per receipt: {:.2}", analytics.overall.average);
    if !analytics.top_items.is_empty() {
        println!("Top items:");
        for item in &analytics.top_items {
            println!("  {}: {}", item.name, item.count);
        }
    }
    println!();
    println!("Full analytics JSON:");
    println!("{}", serde_json::to_string_pretty(&analytics)?);

    Ok(())
}

pub fn generate(receipts: &[Value]) -> Analytics {
    let mut totals: Vec<f64> = Vec::with_capacity(receipts.len());
    let mut by_year: BTreeMap<String, f64> = BTreeMap::new();
    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    let mut item_counts: HashMap<String, usize> = HashMap::new();

    for receipt in receipts {
        let amount = safe_total(receipt);
        totals.push(amount);

        let date = receipt.get("date").and_then(Value::as_str).unwrap_or("");
        let (year, month) = parse_year_month(date);
        *by_year.entry(year).or_insert(0.0) += amount;
        *by_month.entry(month).or_insert(0.0) += amount;

        let items = receipt
            .get("items")
            .or_else(|| receipt.get("lines"))
            .and_then(Value::as_array);
        if let Some(items) = items {
            for item in items {
                if let Some(name) = item_name(item) {
                    *item_counts.entry(name).or_insert(0) += 1;
                }
            }
        }
    }

    let count = totals.len();
    let total_spent: f64 = totals.iter().sum();
    let average = if count > 0 {
        total_spent / count as f64
    } else {
        0.0
    };
    let (min, max) = if totals.is_empty() {
        (0.0, 0.0)
    } else {
        totals
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &t| (lo.min(t), hi.max(t)))
    };

    let mut top_items: Vec<ItemCount> = item_counts
        .into_iter()
        .map(|(name, count)| ItemCount { name, count })
        .collect();
    top_items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    top_items.truncate(TOP_ITEMS);

    Analytics {
        overall: Overall {
            count,
            total_spent,
            average,
            median: median(&mut totals),
            min,
            max,
        },
        totals_by_year: by_year,
        totals_by_month: by_month,
        top_items,
    }
}

/// The model is asked for a numeric total but sometimes emits a string;
/// anything else counts as 0.0.
fn safe_total(receipt: &Value) -> f64 {
    match receipt.get("total") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Splits a DD-MM-YYYY date into ("YYYY", "YYYY-MM") buckets.
fn parse_year_month(date: &str) -> (String, String) {
    let parts: Vec<&str> = date.trim().split('-').collect();
    if parts.len() == 3 {
        if let (Ok(day), Ok(month), Ok(year)) = (
            parts[0].parse::<u32>(),
            parts[1].parse::<u32>(),
            parts[2].parse::<u32>(),
        ) {
            if (1..=31).contains(&day) && (1..=12).contains(&month) {
                return (year.to_string(), format!("{}-{:02}", year, month));
            }
        }
    }
    ("unknown".into(), "unknown".into())
}

fn item_name(item: &Value) -> Option<String> {
    for key in ["name", "title", "description"] {
        if let Some(name) = item.get(key).and_then(Value::as_str) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn median(totals: &mut [f64]) -> f64 {
    if totals.is_empty() {
        return 0.0;
    }
    totals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = totals.len() / 2;
    if totals.len() % 2 == 1 {
        totals[mid]
    } else {
        (totals[mid - 1] + totals[mid]) / 2.0
    }
}
