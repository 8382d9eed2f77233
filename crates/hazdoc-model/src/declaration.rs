//! Operator input for one declaration document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fields::FieldMap;
use crate::keys;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("missing mandatory field(s): {}", .0.join(", "))]
    MissingMandatoryField(Vec<&'static str>),
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),
    #[error("invalid value `{value}` for {field}; expected one of {}", .expected.join("/"))]
    InvalidChoice {
        field: &'static str,
        value: String,
        expected: &'static [&'static str],
    },
}

macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:expr, default = $default:ident, { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Case-insensitive lookup that falls back to the default for anything unknown.
            ///
            /// Reference data is free text, so a cargo row may carry values such as `""` or
            /// `"n/a"`.
            pub fn from_reference(value: &str) -> Self {
                value.parse().unwrap_or_default()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DeclarationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let upper = s.trim().to_ascii_uppercase();
                match upper.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(DeclarationError::InvalidChoice {
                        field: $field,
                        value: s.to_string(),
                        expected: &[$($text),+],
                    }),
                }
            }
        }
    };
}

choice_enum!(
    /// `YES` / `NO`, defaulting to `NO`.
    MarinePollutant, keys::MARINE_POLLUTANT, default = No, { Yes => "YES", No => "NO" }
);

choice_enum!(
    LimitedQuantity, keys::LIMITED_QUANTITY, default = NotApplicable,
    { Yes => "YES", No => "NO", NotApplicable => "-" }
);

choice_enum!(
    NatureOfCargo, keys::NATURE_OF_CARGO, default = NotApplicable,
    { Solid => "SOLID", Liquid => "LIQUID", Gas => "GAS", NotApplicable => "-" }
);

/// Everything the operator enters (or accepts from reference data) for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Declaration {
    pub shipper: String,
    pub shipper_contact_name: String,
    pub shipper_contact_number: String,
    pub shipper_address: String,
    pub consignee: String,
    pub consignee_address: String,
    pub pol: String,
    pub pod: String,
    pub vessel: String,

    pub cargo: String,
    pub technical_name: String,
    pub class: String,
    pub unno: String,
    pub subrisk: String,
    pub packing_group: String,
    pub ems: String,
    pub flash_point: String,
    pub marine_pollutant: MarinePollutant,
    pub limited_quantity: LimitedQuantity,
    pub nature_of_cargo: NatureOfCargo,
    pub mfag_number: String,

    pub quantity: u32,
    pub equipment_type: String,
    pub outer_package: String,
    pub inner_package: String,
    pub gross_wt: String,
    pub net_wt: String,
    pub container_number: Option<String>,
    pub seal_number: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            shipper: String::new(),
            shipper_contact_name: String::new(),
            shipper_contact_number: String::new(),
            shipper_address: String::new(),
            consignee: String::new(),
            consignee_address: String::new(),
            pol: String::new(),
            pod: String::new(),
            vessel: String::new(),
            cargo: String::new(),
            technical_name: String::new(),
            class: String::new(),
            unno: String::new(),
            subrisk: String::new(),
            packing_group: String::new(),
            ems: String::new(),
            flash_point: String::new(),
            marine_pollutant: MarinePollutant::default(),
            limited_quantity: LimitedQuantity::default(),
            nature_of_cargo: NatureOfCargo::default(),
            mfag_number: String::new(),
            quantity: 1,
            equipment_type: String::new(),
            outer_package: String::new(),
            inner_package: String::new(),
            gross_wt: String::new(),
            net_wt: String::new(),
            container_number: None,
            seal_number: None,
        }
    }
}

impl Declaration {
    /// Check the mandatory packaging fields and the quantity.
    ///
    /// All blank mandatory fields are reported together, in form order.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        let mandatory = [
            (keys::OUTER_PACKAGE, &self.outer_package),
            (keys::INNER_PACKAGE, &self.inner_package),
            (keys::GROSS_WT, &self.gross_wt),
            (keys::NET_WT, &self.net_wt),
            (keys::EQUIPMENT_TYPE, &self.equipment_type),
        ];
        let missing: Vec<&'static str> = mandatory
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(DeclarationError::MissingMandatoryField(missing));
        }
        if self.quantity < 1 {
            return Err(DeclarationError::InvalidQuantity(self.quantity));
        }
        Ok(())
    }

    /// `"{quantity}x{equipment}"`, or empty when no equipment type is chosen.
    pub fn qty_equipment(&self) -> String {
        if self.equipment_type.is_empty() || self.quantity == 0 {
            String::new()
        } else {
            format!("{}x{}", self.quantity, self.equipment_type)
        }
    }

    /// Validate and build the canonical field map consumed by the templates.
    pub fn to_field_map(&self) -> Result<FieldMap, DeclarationError> {
        self.validate()?;

        let mut map = FieldMap::new();
        map.insert(keys::SHIPPER, &self.shipper);
        map.insert(keys::SHIPPER_CONTACT_NAME, &self.shipper_contact_name);
        map.insert(keys::SHIPPER_CONTACT_NUMBER, &self.shipper_contact_number);
        map.insert(keys::SHIPPER_ADDRESS, &self.shipper_address);
        map.insert(keys::CONSIGNEE, &self.consignee);
        map.insert(keys::CONSIGNEE_ADDRESS, &self.consignee_address);
        map.insert(keys::POL, &self.pol);
        map.insert(keys::POD, &self.pod);
        map.insert(keys::VESSEL, &self.vessel);
        map.insert(keys::CARGO, &self.cargo);
        map.insert(keys::TECHNICAL_NAME, &self.technical_name);
        map.insert(keys::CLASS, &self.class);
        map.insert(keys::UNNO, &self.unno);
        map.insert(keys::SUBRISK, &self.subrisk);
        map.insert(keys::PACKING_GROUP, &self.packing_group);
        map.insert(keys::EMS, &self.ems);
        map.insert(keys::FLASH_POINT, &self.flash_point);
        map.insert(keys::MARINE_POLLUTANT, self.marine_pollutant.as_str());
        map.insert(keys::LIMITED_QUANTITY, self.limited_quantity.as_str());
        map.insert(keys::NATURE_OF_CARGO, self.nature_of_cargo.as_str());
        map.insert(keys::MFAG_NUMBER, &self.mfag_number);
        map.insert(keys::OUTER_PACKAGE, &self.outer_package);
        map.insert(keys::INNER_PACKAGE, &self.inner_package);
        map.insert(keys::GROSS_WT, &self.gross_wt);
        map.insert(keys::NET_WT, &self.net_wt);
        map.insert(keys::EQUIPMENT_TYPE, &self.equipment_type);
        map.insert(keys::QTY_EQUIPMENT, self.qty_equipment());
        map.insert(keys::QUANTITY, self.quantity);
        map.insert(
            keys::CONTAINER_NUMBER,
            self.container_number.clone().unwrap_or_default(),
        );
        map.insert(keys::SEAL_NUMBER, self.seal_number.clone().unwrap_or_default());
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldValue;
    use pretty_assertions::assert_eq;

    fn complete() -> Declaration {
        Declaration {
            outer_package: "4G".into(),
            inner_package: "1A1".into(),
            gross_wt: "1200 KG".into(),
            net_wt: "1000 KG".into(),
            equipment_type: "20GP".into(),
            quantity: 2,
            ..Declaration::default()
        }
    }

    #[test]
    fn reports_every_blank_mandatory_field() {
        let decl = Declaration {
            gross_wt: "  ".into(),
            equipment_type: String::new(),
            ..complete()
        };
        assert_eq!(
            decl.validate(),
            Err(DeclarationError::MissingMandatoryField(vec![
                keys::GROSS_WT,
                keys::EQUIPMENT_TYPE
            ]))
        );
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let decl = Declaration {
            quantity: 0,
            ..complete()
        };
        assert_eq!(decl.validate(), Err(DeclarationError::InvalidQuantity(0)));
    }

    #[test]
    fn field_map_has_combined_equipment_and_numeric_quantity() {
        let map = complete().to_field_map().unwrap();
        assert_eq!(map.display(keys::QTY_EQUIPMENT).as_deref(), Some("2x20GP"));
        assert_eq!(map.get(keys::QUANTITY), Some(&FieldValue::Number(2.0)));
        assert_eq!(map.display(keys::MARINE_POLLUTANT).as_deref(), Some("NO"));
        assert_eq!(map.display(keys::LIMITED_QUANTITY).as_deref(), Some("-"));
        assert_eq!(map.display(keys::NATURE_OF_CARGO).as_deref(), Some("-"));
        assert_eq!(map.display(keys::SEAL_NUMBER).as_deref(), Some(""));
        assert_eq!(map.len(), 30);
    }

    #[test]
    fn choices_parse_case_insensitively_with_fallback() {
        assert_eq!("liquid".parse::<NatureOfCargo>(), Ok(NatureOfCargo::Liquid));
        assert_eq!(MarinePollutant::from_reference(" yes "), MarinePollutant::Yes);
        assert_eq!(LimitedQuantity::from_reference("n/a"), LimitedQuantity::NotApplicable);
        assert!("maybe".parse::<MarinePollutant>().is_err());
    }
}
