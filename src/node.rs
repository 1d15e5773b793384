use serde::Serialize;

use crate::codec;
use crate::error::{Result, SsrError};

/// Field delimiter of the decoded record, shared with the address rejoin.
const SEP: char = ':';

/// One decoded subscription entry.
///
/// `password`, `obfs_param`, `proto_param`, `remarks` and `group` keep the
/// raw base64 text they arrive in; they are only decoded when a node is
/// displayed or handed to the launcher, so a bad trailing field cannot fail
/// a parse whose caller only needs the address.
#[derive(Debug, Clone)]
pub struct SsrNode {
  pub address: String,
  pub port: String,
  pub protocol: String,
  pub method: String,
  pub obfs: String,
  password: String,
  obfs_param: String,
  proto_param: String,
  remarks: String,
  #[allow(dead_code)]
  group: String,
}

/// A node with every credential field decoded to plain text, ready for the
/// launcher.
#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedNode {
  pub address: String,
  pub port: String,
  pub protocol: String,
  pub method: String,
  pub obfs: String,
  pub password: String,
  pub obfsParam: String,
  pub protoParam: String,
  pub remarks: String,
}

/// Parses one `ssr://` subscription entry.
///
/// The payload decodes to
/// `addr:port:protocol:method:obfs:b64(pass)/?obfsparam=..&protoparam=..&remarks=..&group=..`.
/// The four query markers are normalized to the field delimiter, which flattens
/// the record to either 10 fields, or 17 when the address itself contains the
/// delimiter (IPv6-style). In the 17 case the address is the first 8 fields
/// rejoined; the trailing 9 fields sit at fixed offsets from the end in both
/// layouts.
pub fn parse_link(link: &str) -> Result<SsrNode> {
  let payload = link
    .trim()
    .strip_prefix("ssr://")
    .ok_or_else(|| SsrError::MalformedRecord(format!("not an ssr:// link: {link:.32}")))?;

  let decoded = codec::decode_str(payload)?;
  let flat = decoded
    .replace("/?obfsparam=", ":")
    .replace("&protoparam=", ":")
    .replace("&remarks=", ":")
    .replace("&group=", ":");

  let fields: Vec<&str> = flat.split(SEP).collect();
  let address = match fields.len() {
    17 => fields[..8].join(":"),
    10 => fields[0].to_string(),
    n => {
      return Err(SsrError::MalformedRecord(format!(
        "{n} fields after split, expected 10 or 17"
      )))
    }
  };

  let tail = |back: usize| fields[fields.len() - back].to_string();
  Ok(SsrNode {
    address,
    port: tail(9),
    protocol: tail(8),
    method: tail(7),
    obfs: tail(6),
    password: tail(5),
    obfs_param: tail(4),
    proto_param: tail(3),
    remarks: tail(2),
    group: tail(1),
  })
}

impl SsrNode {
  /// Remarks for display. A remarks field that is not valid base64 falls back
  /// to its raw text so the node stays listable and selectable.
  pub fn remarks_plain(&self) -> String {
    codec::decode_str(&self.remarks).unwrap_or_else(|_| self.remarks.clone())
  }

  /// Decodes the lazily kept credential fields into a launchable node.
  pub fn resolve(&self) -> Result<ResolvedNode> {
    Ok(ResolvedNode {
      address: self.address.clone(),
      port: self.port.clone(),
      protocol: self.protocol.clone(),
      method: self.method.clone(),
      obfs: self.obfs.clone(),
      password: codec::decode_str(&self.password)?,
      obfsParam: codec::decode_str(&self.obfs_param)?,
      protoParam: codec::decode_str(&self.proto_param)?,
      remarks: self.remarks_plain(),
    })
  }
}

impl ResolvedNode {
  /// The launcher contract: eight plain-text values, in exactly this order.
  pub fn launch_params(&self) -> [&str; 8] {
    [
      &self.address,
      &self.port,
      &self.password,
      &self.method,
      &self.obfs,
      &self.protocol,
      &self.protoParam,
      &self.obfsParam,
    ]
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use base64::engine::general_purpose::URL_SAFE_NO_PAD;
  use base64::Engine;

  /// Builds an `ssr://` link the way providers do: inner record with base64
  /// query values, then the outer URL-safe layer with padding stripped.
  pub(crate) fn make_link(
    address: &str,
    port: &str,
    protocol: &str,
    method: &str,
    obfs: &str,
    password: &str,
    obfs_param: &str,
    proto_param: &str,
    remarks: &str,
    group: &str,
  ) -> String {
    let b64 = |s: &str| URL_SAFE_NO_PAD.encode(s);
    let record = format!(
      "{address}:{port}:{protocol}:{method}:{obfs}:{}/?obfsparam={}&protoparam={}&remarks={}&group={}",
      b64(password),
      b64(obfs_param),
      b64(proto_param),
      b64(remarks),
      b64(group),
    );
    format!("ssr://{}", URL_SAFE_NO_PAD.encode(record))
  }

  #[test]
  fn parses_ten_field_record() {
    let link = make_link(
      "1.2.3.4",
      "8080",
      "origin",
      "aes-256-cfb",
      "plain",
      "secret",
      "",
      "",
      "Test Node",
      "",
    );
    let node = parse_link(&link).unwrap();
    assert_eq!(node.address, "1.2.3.4");
    assert_eq!(node.port, "8080");
    assert_eq!(node.protocol, "origin");
    assert_eq!(node.method, "aes-256-cfb");
    assert_eq!(node.obfs, "plain");
    assert_eq!(node.remarks_plain(), "Test Node");
  }

  #[test]
  fn parses_seventeen_field_record_rejoining_address() {
    // A fully expanded IPv6 address carries 7 embedded delimiters, which is
    // exactly the 17-field layout.
    let address = "2001:0db8:0000:0000:0000:0000:0000:0001";
    let link = make_link(
      address,
      "443",
      "auth_aes128_md5",
      "chacha20",
      "tls1.2_ticket_auth",
      "pw",
      "obfs.example.com",
      "32",
      "v6 node",
      "prod",
    );
    let node = parse_link(&link).unwrap();
    assert_eq!(node.address, address);
    assert_eq!(node.port, "443");
    assert_eq!(node.protocol, "auth_aes128_md5");
  }

  #[test]
  fn trailing_fields_identical_across_both_layouts() {
    let mk = |address: &str| {
      make_link(
        address,
        "443",
        "auth_chain_a",
        "none",
        "http_simple",
        "pw",
        "op",
        "pp",
        "rk",
        "gp",
      )
    };
    let v4 = parse_link(&mk("9.9.9.9")).unwrap().resolve().unwrap();
    let v6 = parse_link(&mk("2001:0db8:0000:0000:0000:0000:0000:0001"))
      .unwrap()
      .resolve()
      .unwrap();
    assert_eq!(v4.port, v6.port);
    assert_eq!(v4.protocol, v6.protocol);
    assert_eq!(v4.method, v6.method);
    assert_eq!(v4.obfs, v6.obfs);
    assert_eq!(v4.password, v6.password);
    assert_eq!(v4.obfsParam, v6.obfsParam);
    assert_eq!(v4.protoParam, v6.protoParam);
    assert_eq!(v4.remarks, v6.remarks);
  }

  #[test]
  fn rejects_other_field_counts() {
    let record = "1.2.3.4:443:origin:none:plain"; // 5 fields
    let link = format!("ssr://{}", URL_SAFE_NO_PAD.encode(record));
    assert!(matches!(parse_link(&link), Err(SsrError::MalformedRecord(_))));
  }

  #[test]
  fn rejects_missing_scheme() {
    assert!(matches!(
      parse_link("vmess://whatever"),
      Err(SsrError::MalformedRecord(_))
    ));
  }

  #[test]
  fn rejects_undecodable_payload() {
    assert!(matches!(parse_link("ssr://!!!!"), Err(SsrError::Decode(_))));
  }

  #[test]
  fn resolve_decodes_credentials() {
    let link = make_link(
      "5.6.7.8",
      "8388",
      "origin",
      "rc4-md5",
      "plain",
      "p@ss word",
      "obfs-host",
      "1234",
      "名前",
      "",
    );
    let resolved = parse_link(&link).unwrap().resolve().unwrap();
    assert_eq!(resolved.password, "p@ss word");
    assert_eq!(resolved.obfsParam, "obfs-host");
    assert_eq!(resolved.protoParam, "1234");
    assert_eq!(resolved.remarks, "名前");
  }

  #[test]
  fn launch_params_order_is_stable() {
    let link = make_link(
      "1.1.1.1", "53", "origin", "none", "plain", "pw", "op", "pp", "rk", "",
    );
    let resolved = parse_link(&link).unwrap().resolve().unwrap();
    assert_eq!(
      resolved.launch_params(),
      ["1.1.1.1", "53", "pw", "none", "plain", "origin", "pp", "op"]
    );
  }
}
