use hazdoc_model::{keys, wrap, Declaration, LimitedQuantity, MarinePollutant, NatureOfCargo};

use crate::master::MasterData;

/// Fill the reference-backed parts of `declaration` from `master`.
///
/// Uses the selected cargo, shipper and consignee names already on the declaration. Unknown
/// names leave the corresponding fields blank; addresses are wrapped to `address_width`.
pub fn prefill(declaration: &mut Declaration, master: &MasterData, address_width: usize) {
    match master.cargo.get(&declaration.cargo) {
        Some(details) => {
            declaration.technical_name = details.text(keys::TECHNICAL_NAME);
            declaration.class = details.text(keys::CLASS);
            declaration.unno = details.text(keys::UNNO);
            declaration.subrisk = details.text(keys::SUBRISK);
            declaration.packing_group = details.text(keys::PACKING_GROUP);
            declaration.ems = details.text(keys::EMS);
            declaration.flash_point = details.text(keys::FLASH_POINT);
            declaration.marine_pollutant =
                MarinePollutant::from_reference(&details.text(keys::MARINE_POLLUTANT));
            declaration.limited_quantity =
                LimitedQuantity::from_reference(&details.text(keys::LIMITED_QUANTITY));
            declaration.nature_of_cargo =
                NatureOfCargo::from_reference(&details.text(keys::NATURE_OF_CARGO));
            declaration.mfag_number = details.text(keys::MFAG_NUMBER);
        }
        None => log::debug!("cargo `{}` not in reference data", declaration.cargo),
    }

    let contact = master
        .shipper_contacts
        .get(&declaration.shipper)
        .cloned()
        .unwrap_or_default();
    declaration.shipper_contact_name = contact.contact_name;
    declaration.shipper_contact_number = contact.contact_number;
    declaration.shipper_address = wrap(&contact.address, address_width);

    let consignee_address = master
        .consignee_addresses
        .get(&declaration.consignee)
        .map(String::as_str)
        .unwrap_or_default();
    declaration.consignee_address = wrap(consignee_address, address_width);
}
