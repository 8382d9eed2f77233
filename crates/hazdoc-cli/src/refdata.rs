use anyhow::{Context, Result};
use clap::Subcommand;

use hazdoc_refdata::{NewShipper, Table};

use crate::Session;

#[derive(Subcommand, Debug)]
pub(crate) enum RefdataCommand {
    /// Print one reference table (cargo, equipment, shippers, consignees, ports, vessels)
    Show { table: Table },
    /// Append a shipper
    AddShipper {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        contact_name: String,
        #[arg(long, default_value = "")]
        contact_number: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Append a consignee
    AddConsignee {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        address: String,
    },
    /// Append a port of discharge
    AddPod { pod: String },
    /// Append a vessel
    AddVessel { name: String },
}

pub(crate) fn run(session: &Session, command: RefdataCommand) -> Result<()> {
    let mut refdata = session.reference_data();
    let added = match command {
        RefdataCommand::Show { table } => {
            let data = refdata.table(table)?;
            if session.json {
                return session.print_json(&data);
            }
            println!("{}", data.columns.join("\t"));
            for row in &data.rows {
                // Keep one record per line even for multi-line addresses.
                let cells: Vec<String> = row.iter().map(|cell| cell.replace('\n', "\\n")).collect();
                println!("{}", cells.join("\t"));
            }
            return Ok(());
        }
        RefdataCommand::AddShipper {
            name,
            contact_name,
            contact_number,
            address,
        } => {
            refdata.add_shipper(&NewShipper {
                name: name.clone(),
                contact_name,
                contact_number,
                address,
            })?;
            (Table::Shippers, name)
        }
        RefdataCommand::AddConsignee { name, address } => {
            refdata.add_consignee(&name, &address)?;
            (Table::Consignees, name)
        }
        RefdataCommand::AddPod { pod } => {
            refdata.add_pod(&pod)?;
            (Table::Ports, pod)
        }
        RefdataCommand::AddVessel { name } => {
            refdata.add_vessel(&name)?;
            (Table::Vessels, name)
        }
    };

    let (table, name) = added;
    // Reload to confirm the new row is offered.
    let master = refdata
        .master_data()
        .context("row was appended but the reference data could not be reloaded")?;
    let name = name.trim();
    let listed = match table {
        Table::Shippers => master.shippers.iter().any(|s| s == name),
        Table::Consignees => master.consignees.iter().any(|c| c == name),
        Table::Ports => master.pod_ports.iter().any(|p| p == name),
        Table::Vessels => master.vessels.iter().any(|v| v == name),
        _ => true,
    };
    if !listed {
        log::warn!("`{name}` was appended to {table} but is not offered after reloading");
    }
    if session.json {
        session.print_json(&serde_json::json!({ "table": table.sheet_name(), "added": name }))
    } else {
        println!("added `{name}` to {table}");
        Ok(())
    }
}
