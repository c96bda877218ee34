//! SOAP 1.1 envelope decoding and encoding.
//!
//! Requests are read with a hand-written `quick-xml` event loop that matches
//! elements by local name, so any namespace prefix (or none) is accepted.
//! Responses and faults are written with `quick-xml`'s writer API.

use std::io::{self, Cursor};

use bms_core::{
  envelope::{Header, NAMESPACE, Request},
  response::Response,
};
use quick_xml::{
  Reader, Writer,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::error::{Error, Result};

// ─── Names ───────────────────────────────────────────────────────────────────

pub const NS_SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";

pub const FAULT_CLIENT: &str = "SOAP-ENV:Client";

const REQUEST: &str = "GenericRequest";
const HEADER: &str = "GGheader";

// ─── GenericRequest ──────────────────────────────────────────────────────────

/// Decode the first `GenericRequest` element in `xml`.
///
/// Unknown elements are ignored. Header fields are assigned by element name;
/// absent ones stay `None` and are reported later by header validation.
pub fn decode_request(xml: &[u8]) -> Result<Request> {
  let mut reader = Reader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut buf = Vec::new();
  let mut path: Vec<String> = Vec::new();
  let mut text = String::new();
  let mut request: Option<Request> = None;
  let mut done = false;

  loop {
    match reader.read_event_into(&mut buf) {
      Ok(Event::Start(ref e)) => {
        let name = local_name(e.name().as_ref());
        if !done {
          open(&mut request, &path, &name);
        }
        path.push(name);
        text.clear();
      }
      Ok(Event::Empty(ref e)) => {
        let name = local_name(e.name().as_ref());
        if !done {
          open(&mut request, &path, &name);
        }
      }
      Ok(Event::Text(ref e)) => {
        text.push_str(&e.unescape()?);
      }
      Ok(Event::CData(ref e)) => {
        text.push_str(&String::from_utf8_lossy(e));
      }
      Ok(Event::End(_)) => {
        let Some(name) = path.pop() else {
          return Err(Error::Xml("unbalanced end tag".to_owned()));
        };
        let value = std::mem::take(&mut text);
        if !done && let Some(request) = request.as_mut() {
          if name == REQUEST {
            done = true;
          } else {
            assign(request, &path, &name, value);
          }
        }
      }
      Ok(Event::Eof) => break,
      Err(e) => return Err(e.into()),
      _ => {}
    }
    buf.clear();
  }

  if !path.is_empty() {
    return Err(Error::Xml(format!("unclosed element <{}>", path.join("/"))));
  }
  request.ok_or_else(|| Error::Xml(format!("no {REQUEST} element in body")))
}

fn local_name(name: &[u8]) -> String {
  let local = match name.iter().rposition(|&b| b == b':') {
    Some(pos) => &name[pos + 1..],
    None => name,
  };
  String::from_utf8_lossy(local).into_owned()
}

fn parent_is(path: &[String], name: &str) -> bool {
  path.last().is_some_and(|p| p.eq_ignore_ascii_case(name))
}

/// Track the request and header elements as they open.
fn open(request: &mut Option<Request>, path: &[String], name: &str) {
  if name == REQUEST {
    request.get_or_insert_with(Request::default);
  } else if let Some(request) = request.as_mut()
    && name.eq_ignore_ascii_case(HEADER)
    && parent_is(path, REQUEST)
  {
    request.header.get_or_insert_with(Header::default);
  }
}

fn assign(request: &mut Request, path: &[String], name: &str, value: String) {
  if parent_is(path, HEADER) {
    let header = request.header.get_or_insert_with(Header::default);
    header.set(name, value);
  } else if parent_is(path, REQUEST) {
    match name {
      "id" => request.id = Some(value),
      "indicator" => request.indicator = Some(value),
      "jsonPayload" => request.json_payload = Some(value),
      _ => {}
    }
  }
}

// ─── GenericResponse / Fault ─────────────────────────────────────────────────

type Sink = Writer<Cursor<Vec<u8>>>;

fn io_error(e: io::Error) -> Error { Error::Xml(e.to_string()) }

/// Encode a `GenericResponse` inside a SOAP envelope.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
  envelope(|w| {
    let mut root = BytesStart::new("ns2:GenericResponse");
    root.push_attribute(("xmlns:ns2", NAMESPACE));
    w.write_event(Event::Start(root))?;
    write_text_elem(w, "ns2:responseCode", &response.response_code.to_string())?;
    write_text_elem(w, "ns2:responseMessage", &response.response_message)?;
    if let Some(data) = &response.data {
      write_text_elem(w, "ns2:data", data)?;
    }
    write_text_elem(w, "ns2:timestamp", &response.timestamp_text())?;
    write_end(w, "ns2:GenericResponse")
  })
}

/// Encode a SOAP 1.1 Fault.
pub fn encode_fault(code: &str, message: &str) -> Result<Vec<u8>> {
  envelope(|w| {
    write_start(w, "SOAP-ENV:Fault")?;
    write_text_elem(w, "faultcode", code)?;
    let mut string = BytesStart::new("faultstring");
    string.push_attribute(("xml:lang", "en"));
    w.write_event(Event::Start(string))?;
    w.write_event(Event::Text(BytesText::new(message)))?;
    write_end(w, "faultstring")?;
    write_end(w, "SOAP-ENV:Fault")
  })
}

fn envelope(body: impl FnOnce(&mut Sink) -> io::Result<()>) -> Result<Vec<u8>> {
  let mut writer = Writer::new(Cursor::new(Vec::new()));
  let w = &mut writer;
  w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    .map_err(io_error)?;

  let mut root = BytesStart::new("SOAP-ENV:Envelope");
  root.push_attribute(("xmlns:SOAP-ENV", NS_SOAP_ENV));
  w.write_event(Event::Start(root)).map_err(io_error)?;
  w.write_event(Event::Empty(BytesStart::new("SOAP-ENV:Header")))
    .map_err(io_error)?;
  write_start(w, "SOAP-ENV:Body").map_err(io_error)?;
  body(w).map_err(io_error)?;
  write_end(w, "SOAP-ENV:Body").map_err(io_error)?;
  write_end(w, "SOAP-ENV:Envelope").map_err(io_error)?;

  Ok(writer.into_inner().into_inner())
}

// ─── XML writer helpers ──────────────────────────────────────────────────────

fn write_start(w: &mut Sink, tag: &str) -> io::Result<()> {
  w.write_event(Event::Start(BytesStart::new(tag)))
}

fn write_end(w: &mut Sink, tag: &str) -> io::Result<()> {
  w.write_event(Event::End(BytesEnd::new(tag)))
}

fn write_text_elem(w: &mut Sink, tag: &str, text: &str) -> io::Result<()> {
  write_start(w, tag)?;
  w.write_event(Event::Text(BytesText::new(text)))?;
  write_end(w, tag)
}

#[cfg(test)]
mod tests {
  use bms_core::response::ResponseCode;

  use super::*;

  const REQUEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/"
                  xmlns:uhi="http://teradata.com/uhi">
  <soapenv:Header/>
  <soapenv:Body>
    <uhi:GenericRequest>
      <uhi:GGheader>
        <uhi:correlationId>1</uhi:correlationId>
        <uhi:originatingChannel>16</uhi:originatingChannel>
        <uhi:channelRequestId>2</uhi:channelRequestId>
        <uhi:originatingUserType>1</uhi:originatingUserType>
        <uhi:originatingUserIdentifier>2970430001808</uhi:originatingUserIdentifier>
        <uhi:serviceSlug>BMS-LOOKUP-01</uhi:serviceSlug>
        <uhi:serviceEntityId>1</uhi:serviceEntityId>
      </uhi:GGheader>
      <uhi:id>42</uhi:id>
      <uhi:indicator>l</uhi:indicator>
      <uhi:jsonPayload>{"listName":"Area","name":"A &amp; B"}</uhi:jsonPayload>
    </uhi:GenericRequest>
  </soapenv:Body>
</soapenv:Envelope>"#;

  #[test]
  fn decodes_prefixed_request() {
    let req = decode_request(REQUEST_XML.as_bytes()).unwrap();
    let header = req.header.as_ref().unwrap();
    assert_eq!(header.correlation_id.as_deref(), Some("1"));
    assert_eq!(header.service_slug.as_deref(), Some("BMS-LOOKUP-01"));
    assert_eq!(req.id.as_deref(), Some("42"));
    assert_eq!(req.indicator.as_deref(), Some("l"));
    assert_eq!(
      req.json_payload.as_deref(),
      Some(r#"{"listName":"Area","name":"A & B"}"#)
    );
  }

  #[test]
  fn decodes_unprefixed_request_with_cdata_payload() {
    let xml = r#"<Envelope><Body><GenericRequest xmlns="http://teradata.com/uhi">
      <indicator>i</indicator>
      <jsonPayload><![CDATA[{"listName":"Area","list":[]}]]></jsonPayload>
    </GenericRequest></Body></Envelope>"#;
    let req = decode_request(xml.as_bytes()).unwrap();
    assert!(req.header.is_none());
    assert_eq!(req.indicator.as_deref(), Some("i"));
    assert_eq!(req.json_payload.as_deref(), Some(r#"{"listName":"Area","list":[]}"#));
  }

  #[test]
  fn empty_header_element_is_present_but_blank() {
    let xml = "<Envelope><Body><GenericRequest><GGheader/><indicator>l</indicator>\
               </GenericRequest></Body></Envelope>";
    let req = decode_request(xml.as_bytes()).unwrap();
    assert_eq!(req.header, Some(Header::default()));
  }

  #[test]
  fn rejects_documents_without_a_request() {
    let err = decode_request(b"<Envelope><Body/></Envelope>").unwrap_err();
    assert!(matches!(err, Error::Xml(_)));
  }

  #[test]
  fn rejects_malformed_xml() {
    assert!(decode_request(b"<Envelope><Body><GenericRequest></Body>").is_err());
    assert!(decode_request(b"<Envelope><Body><GenericRequest>").is_err());
  }

  #[test]
  fn encodes_response_with_escaped_data() {
    let response = Response::success("Lookup completed successfully")
      .with_data(r#"[{"id":"1","name":"<x>"}]"#);
    let xml = String::from_utf8(encode_response(&response).unwrap()).unwrap();
    assert!(xml.contains("<ns2:GenericResponse xmlns:ns2=\"http://teradata.com/uhi\">"));
    assert!(xml.contains("<ns2:responseCode>200</ns2:responseCode>"));
    assert!(xml.contains("&lt;x&gt;"), "{xml}");
  }

  #[test]
  fn omits_absent_data() {
    let response = Response::new(ResponseCode::NotFound, "No records found");
    let xml = String::from_utf8(encode_response(&response).unwrap()).unwrap();
    assert!(!xml.contains("ns2:data"));
    assert!(xml.contains("<ns2:timestamp>"));
  }

  #[test]
  fn encodes_fault() {
    let xml = String::from_utf8(encode_fault(FAULT_CLIENT, "bad & broken").unwrap()).unwrap();
    assert!(xml.contains("<faultcode>SOAP-ENV:Client</faultcode>"));
    assert!(xml.contains("bad &amp; broken"));
  }
}
