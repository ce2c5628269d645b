//! Parser for the calibration XML document served at `/netftapi2.xml`
//! (§4.1, §6.3). The document is small and fixed-shape, so a tag scanner
//! is used instead of pulling in a general XML dependency; the priority-
//! ordered element name fallback mirrors the original sensor vendor's
//! client implementation.

use crate::error::{GsdvError, Result};
use crate::models::Calibration;

/// Find the first matching element's text content, trying `names` in
/// priority order. Matches `<name>text</name>`, ignoring attributes and
/// surrounding whitespace.
fn find_element<'a>(xml: &'a str, names: &[&str]) -> Option<&'a str> {
    for name in names {
        let open_prefix = format!("<{name}");
        if let Some(open_start) = xml.find(&open_prefix) {
            let after_tag = &xml[open_start + open_prefix.len()..];
            let Some(gt) = after_tag.find('>') else { continue };
            let is_self_closing = after_tag[..gt].trim_end().ends_with('/');
            if is_self_closing {
                continue;
            }
            let body_start = open_start + open_prefix.len() + gt + 1;
            let close_tag = format!("</{name}>");
            if let Some(close_rel) = xml[body_start..].find(&close_tag) {
                let text = xml[body_start..body_start + close_rel].trim();
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// Parse the calibration document per §6.3's priority-ordered element
/// names. `counts_per_force`/`counts_per_torque` are required and must be
/// positive; everything else is optional.
pub fn parse_calibration_xml(xml: &str) -> Result<Calibration> {
    let cpf_text = find_element(xml, &["cfgcpf", "countsPerForce", "cpf"])
        .ok_or_else(|| GsdvError::calibration_parse("HTTP", "counts_per_force", "element not found"))?;
    let counts_per_force: f64 = cpf_text
        .parse()
        .map_err(|_| GsdvError::calibration_parse("HTTP", "counts_per_force", format!("'{cpf_text}' is not a number")))?;
    if counts_per_force <= 0.0 {
        return Err(GsdvError::calibration_parse("HTTP", "counts_per_force", "must be positive"));
    }

    let cpt_text = find_element(xml, &["cfgcpt", "countsPerTorque", "cpt"])
        .ok_or_else(|| GsdvError::calibration_parse("HTTP", "counts_per_torque", "element not found"))?;
    let counts_per_torque: f64 = cpt_text
        .parse()
        .map_err(|_| GsdvError::calibration_parse("HTTP", "counts_per_torque", format!("'{cpt_text}' is not a number")))?;
    if counts_per_torque <= 0.0 {
        return Err(GsdvError::calibration_parse("HTTP", "counts_per_torque", "must be positive"));
    }

    let mut cal = Calibration::new(counts_per_force, counts_per_torque);
    cal.serial_number = find_element(xml, &["setserial", "serial"]).map(str::to_string);
    cal.firmware_version = find_element(xml, &["setfwver", "firmware"]).map(str::to_string);
    cal.force_units_code = find_element(xml, &["cfgfu", "forceUnits"]).and_then(|s| s.parse().ok());
    cal.torque_units_code = find_element(xml, &["cfgtu", "torqueUnits"]).and_then(|s| s.parse().ok());

    Ok(cal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"
        <netft>
            <cfgcpf>1000000</cfgcpf>
            <cfgcpt>1000000</cfgcpt>
            <setserial>FT12345</setserial>
            <setfwver>1.2.3</setfwver>
            <cfgfu>2</cfgfu>
            <cfgtu>3</cfgtu>
        </netft>
    "#;

    #[test]
    fn parses_required_and_optional_fields() {
        let cal = parse_calibration_xml(SAMPLE_XML).unwrap();
        assert_eq!(cal.counts_per_force, 1_000_000.0);
        assert_eq!(cal.counts_per_torque, 1_000_000.0);
        assert_eq!(cal.serial_number.as_deref(), Some("FT12345"));
        assert_eq!(cal.force_units_code, Some(2));
    }

    #[test]
    fn falls_back_to_alternate_element_names() {
        let xml = "<netft><countsPerForce>500</countsPerForce><cpt>600</cpt></netft>";
        let cal = parse_calibration_xml(xml).unwrap();
        assert_eq!(cal.counts_per_force, 500.0);
        assert_eq!(cal.counts_per_torque, 600.0);
    }

    #[test]
    fn missing_required_field_errors() {
        let xml = "<netft><cfgcpf>500</cfgcpf></netft>";
        let err = parse_calibration_xml(xml).unwrap_err();
        assert_eq!(err.code(), "CAL-003");
    }

    #[test]
    fn non_positive_required_field_errors() {
        let xml = "<netft><cfgcpf>-5</cfgcpf><cfgcpt>10</cfgcpt></netft>";
        assert!(parse_calibration_xml(xml).is_err());
    }
}
