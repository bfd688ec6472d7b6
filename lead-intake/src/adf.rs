use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::api::IntakeError;

/// One node of the parsed ADF document: element name, attributes, collapsed
/// text content and child elements, in document order.
#[derive(Debug, Default)]
pub struct Element {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Trimmed text content; None when empty or whitespace-only.
    pub fn text_trimmed(&self) -> Option<String> {
        let text = self.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_owned())
        }
    }

    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(Element::text_trimmed)
    }
}

fn open_element(start: &BytesStart) -> Result<Element, IntakeError> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Default::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| IntakeError::MalformedXml(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| IntakeError::MalformedXml(e.to_string()))?
            .into_owned();
        element.attributes.insert(key, value);
    }

    Ok(element)
}

/// Parse the raw payload into an element tree. Processing instructions (the
/// `<?adf?>` prolog) and comments are skipped; the first top-level element
/// becomes the root.
pub fn parse_document(raw: &str) -> Result<Element, IntakeError> {
    let mut reader = Reader::from_str(raw);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref start)) => {
                stack.push(open_element(start)?);
            }
            Ok(Event::Empty(ref start)) => {
                let element = open_element(start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = root.or(Some(element)),
                }
            }
            Ok(Event::Text(ref text)) => {
                if let Some(open) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| IntakeError::MalformedXml(e.to_string()))?;
                    open.text.push_str(&unescaped);
                }
            }
            Ok(Event::End(_)) => {
                // reader enforces tag balance, the stack cannot be empty here
                if let Some(element) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => root = root.or(Some(element)),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(IntakeError::MalformedXml(e.to_string())),
            Ok(_) => {}
        }
    }

    if !stack.is_empty() {
        return Err(IntakeError::MalformedXml("unclosed element".to_owned()));
    }

    root.ok_or(IntakeError::MissingAdfRoot)
}

/// Customer contact block of an ADF prospect.
#[derive(Debug, Default, PartialEq)]
pub struct AdfCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub mobile_phone: Option<String>,
    pub home_phone: Option<String>,
    pub work_phone: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub comments: Option<String>,
}

#[derive(Debug, Default, PartialEq)]
pub struct AdfVehicle {
    pub year: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
}

#[derive(Debug, PartialEq)]
pub struct AdfVendor {
    pub name: String,
}

#[derive(Debug, PartialEq)]
pub struct AdfLead {
    pub customer: AdfCustomer,
    pub vehicle: AdfVehicle,
    pub vendor: AdfVendor,
}

/// Pull the three required substructures out of a parsed document. Each
/// absence is its own rejection reason.
pub fn extract_lead(root: &Element) -> Result<AdfLead, IntakeError> {
    if root.name != "adf" {
        return Err(IntakeError::MissingAdfRoot);
    }
    let prospect = root.child("prospect").ok_or(IntakeError::MissingProspect)?;

    let customer_block = prospect.child("customer").ok_or(IntakeError::MissingCustomer)?;
    let contact = customer_block
        .child("contact")
        .ok_or(IntakeError::MissingCustomer)?;
    let vehicle_block = prospect.child("vehicle").ok_or(IntakeError::MissingVehicle)?;
    let vendor_block = prospect.child("vendor").ok_or(IntakeError::MissingVendor)?;

    let vendor_name = vendor_block
        .child_text("vendorname")
        .or_else(|| {
            vendor_block
                .child("contact")
                .and_then(|c| c.child_text("name"))
        })
        .ok_or(IntakeError::MissingVendor)?;

    let mut customer = AdfCustomer {
        email: contact.child_text("email"),
        comments: customer_block.child_text("comments"),
        ..Default::default()
    };

    for name in contact.children_named("name") {
        let Some(value) = name.text_trimmed() else {
            continue;
        };
        match name.attr("part") {
            Some("first") => customer.first_name = Some(value),
            Some("last") => customer.last_name = Some(value),
            // a bare <name> is treated as a first name if none was given
            None if customer.first_name.is_none() => customer.first_name = Some(value),
            _ => {}
        }
    }

    for phone in contact.children_named("phone") {
        let Some(number) = phone.text_trimmed() else {
            continue;
        };
        match phone.attr("type") {
            Some("cellphone") | Some("mobile") => {
                if customer.mobile_phone.is_none() {
                    customer.mobile_phone = Some(number);
                }
            }
            Some("voice") | Some("home") => {
                if customer.home_phone.is_none() {
                    customer.home_phone = Some(number);
                }
            }
            Some("workphone") | Some("work") => {
                if customer.work_phone.is_none() {
                    customer.work_phone = Some(number);
                }
            }
            // untyped numbers fill the mobile slot first
            _ => {
                if customer.mobile_phone.is_none() {
                    customer.mobile_phone = Some(number);
                } else if customer.home_phone.is_none() {
                    customer.home_phone = Some(number);
                }
            }
        }
    }

    if let Some(address) = contact.child("address") {
        customer.street = address.child_text("street");
        customer.city = address.child_text("city");
        customer.region = address.child_text("regioncode");
        customer.postal_code = address.child_text("postalcode");
    }

    let vehicle = AdfVehicle {
        year: vehicle_block.child_text("year"),
        make: vehicle_block.child_text("make"),
        model: vehicle_block.child_text("model"),
        trim: vehicle_block.child_text("trim"),
    };

    Ok(AdfLead {
        customer,
        vehicle,
        vendor: AdfVendor { name: vendor_name },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DOC: &str = r#"<?adf version="1.0"?>
<adf>
  <prospect>
    <requestdate>2024-05-01T10:00:00-05:00</requestdate>
    <vehicle>
      <year>2022</year>
      <make>Ford</make>
      <model>F150</model>
      <trim>Lariat</trim>
    </vehicle>
    <customer>
      <contact>
        <name part="first">Jane</name>
        <name part="last">Doe</name>
        <email>jane.doe@example.com</email>
        <phone type="cellphone">555-0100</phone>
        <phone type="voice">555-0101</phone>
        <address>
          <street>1 Main St</street>
          <city>Springfield</city>
          <regioncode>IL</regioncode>
          <postalcode>62701</postalcode>
        </address>
      </contact>
      <comments>Interested in towing package</comments>
    </customer>
    <vendor>
      <vendorname>Ace Motors</vendorname>
    </vendor>
  </prospect>
</adf>"#;

    fn parse(doc: &str) -> Result<AdfLead, IntakeError> {
        extract_lead(&parse_document(doc)?)
    }

    #[test]
    fn parses_a_full_document() {
        let lead = parse(FULL_DOC).unwrap();

        assert_eq!(lead.vendor.name, "Ace Motors");
        assert_eq!(lead.customer.first_name.as_deref(), Some("Jane"));
        assert_eq!(lead.customer.last_name.as_deref(), Some("Doe"));
        assert_eq!(lead.customer.email.as_deref(), Some("jane.doe@example.com"));
        assert_eq!(lead.customer.mobile_phone.as_deref(), Some("555-0100"));
        assert_eq!(lead.customer.home_phone.as_deref(), Some("555-0101"));
        assert_eq!(lead.customer.city.as_deref(), Some("Springfield"));
        assert_eq!(lead.customer.postal_code.as_deref(), Some("62701"));
        assert_eq!(
            lead.customer.comments.as_deref(),
            Some("Interested in towing package")
        );
        assert_eq!(lead.vehicle.year.as_deref(), Some("2022"));
        assert_eq!(lead.vehicle.make.as_deref(), Some("Ford"));
        assert_eq!(lead.vehicle.model.as_deref(), Some("F150"));
        assert_eq!(lead.vehicle.trim.as_deref(), Some("Lariat"));
    }

    #[test]
    fn each_missing_block_is_a_distinct_rejection() {
        let no_prospect = "<adf></adf>";
        assert!(matches!(parse(no_prospect), Err(IntakeError::MissingProspect)));

        let no_customer = r#"<adf><prospect>
            <vehicle><make>Ford</make></vehicle>
            <vendor><vendorname>Ace Motors</vendorname></vendor>
        </prospect></adf>"#;
        assert!(matches!(parse(no_customer), Err(IntakeError::MissingCustomer)));

        let no_vehicle = r#"<adf><prospect>
            <customer><contact><name part="first">Jane</name></contact></customer>
            <vendor><vendorname>Ace Motors</vendorname></vendor>
        </prospect></adf>"#;
        assert!(matches!(parse(no_vehicle), Err(IntakeError::MissingVehicle)));

        let no_vendor = r#"<adf><prospect>
            <customer><contact><name part="first">Jane</name></contact></customer>
            <vehicle><make>Ford</make></vehicle>
        </prospect></adf>"#;
        assert!(matches!(parse(no_vendor), Err(IntakeError::MissingVendor)));
    }

    #[test]
    fn customer_block_without_contact_is_missing_customer() {
        let doc = r#"<adf><prospect>
            <customer><comments>no contact here</comments></customer>
            <vehicle><make>Ford</make></vehicle>
            <vendor><vendorname>Ace Motors</vendorname></vendor>
        </prospect></adf>"#;
        assert!(matches!(parse(doc), Err(IntakeError::MissingCustomer)));
    }

    #[test]
    fn vendor_name_falls_back_to_vendor_contact() {
        let doc = r#"<adf><prospect>
            <customer><contact><name part="first">Jane</name></contact></customer>
            <vehicle><make>Ford</make></vehicle>
            <vendor><contact><name>Ace Motors</name></contact></vendor>
        </prospect></adf>"#;
        assert_eq!(parse(doc).unwrap().vendor.name, "Ace Motors");
    }

    #[test]
    fn wrong_root_element_is_rejected() {
        let doc = "<lead><prospect></prospect></lead>";
        assert!(matches!(parse(doc), Err(IntakeError::MissingAdfRoot)));
    }

    #[test]
    fn truncated_document_is_malformed() {
        assert!(matches!(
            parse_document("<adf><prospect>"),
            Err(IntakeError::MalformedXml(_))
        ));
    }

    #[test]
    fn text_is_trimmed_and_entities_unescaped() {
        let doc = r#"<adf><prospect>
            <customer><contact>
                <name part="first">  Jane </name>
                <email> jane&amp;co@example.com </email>
            </contact></customer>
            <vehicle><make>Ford</make></vehicle>
            <vendor><vendorname>Smith &amp; Sons</vendorname></vendor>
        </prospect></adf>"#;
        let lead = parse(doc).unwrap();
        assert_eq!(lead.customer.first_name.as_deref(), Some("Jane"));
        assert_eq!(lead.customer.email.as_deref(), Some("jane&co@example.com"));
        assert_eq!(lead.vendor.name, "Smith & Sons");
    }

    #[test]
    fn missing_optional_fields_stay_none() {
        let doc = r#"<adf><prospect>
            <customer><contact><name part="first">Jane</name></contact></customer>
            <vehicle><make>Ford</make></vehicle>
            <vendor><vendorname>Ace Motors</vendorname></vendor>
        </prospect></adf>"#;
        let lead = parse(doc).unwrap();
        assert_eq!(lead.customer.last_name, None);
        assert_eq!(lead.customer.email, None);
        assert_eq!(lead.customer.mobile_phone, None);
        assert_eq!(lead.vehicle.year, None);
    }
}
