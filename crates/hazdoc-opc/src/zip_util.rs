use std::io::Read;

use crate::package::OpcError;

/// Compare two part names the way Office does when resolving them.
///
/// Leading separators are ignored, `\` counts as `/`, ASCII case is folded and `%XX` escapes
/// are decoded.
pub(crate) fn zip_part_names_equivalent(a: &str, b: &str) -> bool {
    normalized_bytes(a).eq(normalized_bytes(b))
}

fn normalized_bytes(name: &str) -> impl Iterator<Item = u8> + '_ {
    fn hex_val(b: u8) -> Option<u8> {
        (b as char).to_digit(16).map(|d| d as u8)
    }

    let bytes = name.as_bytes();
    let mut pos = 0usize;
    let decoded = std::iter::from_fn(move || {
        let b = *bytes.get(pos)?;
        if b == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(pos + 1).copied().and_then(hex_val),
                bytes.get(pos + 2).copied().and_then(hex_val),
            ) {
                pos += 3;
                return Some((hi << 4) | lo);
            }
        }
        pos += 1;
        Some(b)
    });

    decoded
        .map(|b| if b == b'\\' { b'/' } else { b.to_ascii_lowercase() })
        .skip_while(|b| *b == b'/')
}

/// Running total of inflated bytes for one package load.
#[derive(Debug)]
pub(crate) struct InflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl InflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    pub(crate) fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    fn too_large(&self, extra: u64) -> OpcError {
        OpcError::PackageTooLarge {
            total: self.used_bytes.saturating_add(extra),
            max: self.max_total_bytes,
        }
    }

    fn consume(&mut self, bytes: u64) -> Result<(), OpcError> {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
        if self.used_bytes > self.max_total_bytes {
            return Err(self.too_large(0));
        }
        Ok(())
    }
}

/// Inflate one ZIP entry under both the per-part limit and the package budget.
///
/// The declared size is only a fast-path check. Reads are capped at `limit + 1` bytes so a
/// forged size field cannot make us buffer more than the limit.
pub(crate) fn read_entry_with_budget<R: Read>(
    entry: R,
    part: &str,
    declared_size: u64,
    max_part_bytes: u64,
    budget: &mut InflateBudget,
) -> Result<Vec<u8>, OpcError> {
    let remaining_total = budget.remaining_bytes();
    let effective_max = max_part_bytes.min(remaining_total);
    let limit_is_total = effective_max < max_part_bytes;

    if declared_size > max_part_bytes {
        return Err(OpcError::PartTooLarge {
            part: part.to_string(),
            size: declared_size,
            max: max_part_bytes,
        });
    }
    if limit_is_total && declared_size > effective_max {
        return Err(budget.too_large(declared_size));
    }

    let mut buf = Vec::new();
    entry
        .take(effective_max.saturating_add(1))
        .read_to_end(&mut buf)?;

    let observed = buf.len() as u64;
    if observed > effective_max {
        if limit_is_total {
            return Err(budget.too_large(observed));
        }
        return Err(OpcError::PartTooLarge {
            part: part.to_string(),
            size: observed,
            max: max_part_bytes,
        });
    }

    budget.consume(observed)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_handles_case_separators_and_leading_slashes() {
        assert!(zip_part_names_equivalent("XL\\Workbook.xml", "xl/workbook.xml"));
        assert!(zip_part_names_equivalent("/xl/workbook.xml", "xl/workbook.xml"));
        assert!(!zip_part_names_equivalent("xl/workbook.xml", "xl/workbook.xml.rels"));
    }

    #[test]
    fn equivalent_decodes_percent_escapes() {
        assert!(zip_part_names_equivalent(
            "word/header 1.xml",
            "word/header%201.xml"
        ));
        assert!(zip_part_names_equivalent("a%zz", "A%ZZ"));
    }

    #[test]
    fn forged_declared_size_is_caught_by_the_read_cap() {
        let mut budget = InflateBudget::new(1024);
        let data = vec![b'x'; 32];
        let err = read_entry_with_budget(data.as_slice(), "p.xml", 4, 8, &mut budget).unwrap_err();
        assert!(matches!(err, OpcError::PartTooLarge { size: 9, max: 8, .. }));
    }

    #[test]
    fn budget_accumulates_across_entries() {
        let mut budget = InflateBudget::new(10);
        read_entry_with_budget(&b"123456"[..], "a", 6, 100, &mut budget).unwrap();
        assert_eq!(budget.used_bytes(), 6);
        let err = read_entry_with_budget(&b"7890ab"[..], "b", 6, 100, &mut budget).unwrap_err();
        assert!(matches!(err, OpcError::PackageTooLarge { total: 12, max: 10 }));
    }
}
