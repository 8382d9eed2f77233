use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use hazdoc_model::{
    wrap, Declaration, DeclarationError, LimitedQuantity, MarinePollutant, NatureOfCargo,
};
use hazdoc_refdata::prefill;

use crate::Session;

#[derive(Args, Debug)]
pub(crate) struct DeclareArgs {
    /// Template display name or path
    #[arg(long)]
    template: String,

    /// Proper shipping name, as listed in the cargo table
    #[arg(long)]
    cargo: String,

    #[arg(long, default_value = "")]
    shipper: String,

    #[arg(long, default_value = "")]
    consignee: String,

    /// Port of loading
    #[arg(long, default_value = "")]
    pol: String,

    /// Port of discharge
    #[arg(long, default_value = "")]
    pod: String,

    #[arg(long, default_value = "")]
    vessel: String,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    quantity: u32,

    #[arg(long, default_value = "")]
    equipment_type: String,

    #[arg(long, default_value = "")]
    outer_package: String,

    #[arg(long, default_value = "")]
    inner_package: String,

    #[arg(long, default_value = "")]
    gross_wt: String,

    #[arg(long, default_value = "")]
    net_wt: String,

    #[arg(long)]
    container_number: Option<String>,

    #[arg(long)]
    seal_number: Option<String>,

    /// Override the shipper contact from the reference data
    #[arg(long)]
    shipper_contact_name: Option<String>,

    #[arg(long)]
    shipper_contact_number: Option<String>,

    /// Override the shipper address (wrapped to the configured width)
    #[arg(long)]
    shipper_address: Option<String>,

    /// Override the consignee address (wrapped to the configured width)
    #[arg(long)]
    consignee_address: Option<String>,

    #[arg(long)]
    technical_name: Option<String>,

    /// YES or NO
    #[arg(long)]
    marine_pollutant: Option<MarinePollutant>,

    /// YES, NO or -
    #[arg(long)]
    limited_quantity: Option<LimitedQuantity>,

    /// SOLID, LIQUID, GAS or -
    #[arg(long)]
    nature_of_cargo: Option<NatureOfCargo>,

    #[arg(long)]
    mfag_number: Option<String>,

    /// Print the resolved fields as JSON instead of filling the template
    #[arg(long)]
    print_fields: bool,

    /// Output folder (default: `output_dir` from the config)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

pub(crate) fn run(session: &Session, args: DeclareArgs) -> Result<()> {
    let template = session.resolve_template(&args.template)?;
    let mut refdata = session.reference_data();
    let master = refdata.master_data()?;

    if !master.cargo.contains_key(&args.cargo) {
        log::warn!("cargo `{}` is not in the cargo table; details stay blank", args.cargo);
    }
    let equipment_type = args.equipment_type.trim().to_string();
    if !equipment_type.is_empty() && !master.equipment_types.contains(&equipment_type) {
        log::warn!("equipment type `{equipment_type}` is not in the reference list");
    }

    let mut declaration = Declaration {
        shipper: args.shipper,
        consignee: args.consignee,
        pol: args.pol,
        pod: args.pod,
        vessel: args.vessel,
        cargo: args.cargo,
        quantity: args.quantity,
        equipment_type,
        outer_package: args.outer_package,
        inner_package: args.inner_package,
        gross_wt: args.gross_wt,
        net_wt: args.net_wt,
        container_number: args.container_number,
        seal_number: args.seal_number,
        ..Declaration::default()
    };
    let width = session.config.address_width;
    prefill(&mut declaration, &master, width);

    apply(&mut declaration.shipper_contact_name, args.shipper_contact_name);
    apply(&mut declaration.shipper_contact_number, args.shipper_contact_number);
    apply(
        &mut declaration.shipper_address,
        args.shipper_address.map(|a| wrap(&a, width)),
    );
    apply(
        &mut declaration.consignee_address,
        args.consignee_address.map(|a| wrap(&a, width)),
    );
    apply(&mut declaration.technical_name, args.technical_name);
    apply(&mut declaration.marine_pollutant, args.marine_pollutant);
    apply(&mut declaration.limited_quantity, args.limited_quantity);
    apply(&mut declaration.nature_of_cargo, args.nature_of_cargo);
    apply(&mut declaration.mfag_number, args.mfag_number);

    let fields = declaration.to_field_map().map_err(|err| match err {
        DeclarationError::MissingMandatoryField(_) => {
            anyhow::Error::new(err).context("please fill all mandatory fields")
        }
        other => other.into(),
    })?;

    if args.print_fields {
        return session.print_json(&fields);
    }
    let document = hazdoc_io::fill(&template, &fields)
        .with_context(|| format!("failed to generate `{}`", template.display_name))?;
    session.write_output(&document, args.out_dir.as_deref())
}
