//! Terminal tables.

use comfy_table::{Table, presets::UTF8_FULL};
use rollout_deploy::{DeployTask, DeploymentLedger, GasEstimate, VerificationSummary};
use strum::{EnumMessage, IntoEnumIterator};

pub fn ledger_table(ledger: &DeploymentLedger) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Name",
        "Contract",
        "Address",
        "Attempts",
        "Gas limit",
        "Gas price (gwei)",
        "Cost",
    ]);

    for record in ledger.records() {
        let (gas_limit, gas_price, cost) = match &record.gas_estimate {
            Some(estimate) => (
                estimate.gas_limit.to_string(),
                estimate.gas_price_gwei.clone(),
                estimate.cost_native.clone(),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            record.name.clone(),
            record.contract.clone(),
            record.address.to_checksum(None),
            record.attempts.to_string(),
            gas_limit,
            gas_price,
            cost,
        ]);
    }

    table
}

pub fn total_line(total: &GasEstimate) -> String {
    format!(
        "Total: {} gas at {} gwei = {} ({} wei)",
        total.gas_limit, total.gas_price_gwei, total.cost_native, total.cost
    )
}

pub fn tasks_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Task", "Description"]);
    for task in DeployTask::iter() {
        table.add_row(vec![
            task.to_string(),
            task.get_message().unwrap_or_default().to_string(),
        ]);
    }
    table
}

pub fn verification_table(summary: &VerificationSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Name", "Verification"]);
    for name in &summary.verified {
        table.add_row(vec![name.clone(), "verified".to_string()]);
    }
    for (name, error) in &summary.failed {
        table.add_row(vec![name.clone(), format!("failed: {error}")]);
    }
    table
}
