use anyhow::{anyhow, bail};
use uuid::Uuid;

/// The addressing URL carried in the `url` fields of the connect messages: a flat key/value
///  store rendered as `x-directplay:/k=v;k=v;...`. On the wire the messages treat the URL as
///  an opaque string; this type is for callers that need to build or inspect one.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Address {
    // insertion order is kept, except that the provider component always renders first
    components: Vec<(String, AddressComponent)>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum AddressComponent {
    Text(String),
    Number(i32),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl Address {
    pub const KEY_HOSTNAME: &'static str = "hostname";
    pub const KEY_PORT: &'static str = "port";
    pub const KEY_PROVIDER: &'static str = "provider";

    pub const SERVICE_PROVIDER_TCP_IP: Uuid =
        Uuid::from_u128(0xebfe7ba0_628d_11d2_ae0f_006097b01411);

    const SCHEME: &'static str = "x-directplay:/";

    pub fn new() -> Address {
        Address { components: Vec::new() }
    }

    /// tcp/ip address of a peer's endpoint
    pub fn for_host(hostname: &str, port: i32) -> Address {
        let mut address = Address::new();
        address.set_component(Self::KEY_PROVIDER, AddressComponent::Guid(Self::SERVICE_PROVIDER_TCP_IP));
        address.set_component(Self::KEY_HOSTNAME, AddressComponent::Text(hostname.to_string()));
        address.set_component(Self::KEY_PORT, AddressComponent::Number(port));
        address
    }

    pub fn set_component(&mut self, key: &str, value: AddressComponent) {
        if let Some(existing) = self.components.iter_mut().find(|(k, _)| k == key) {
            existing.1 = value;
        }
        else {
            self.components.push((key.to_string(), value));
        }
    }

    pub fn component(&self, key: &str) -> Option<&AddressComponent> {
        self.components
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn url(&self) -> String {
        let mut ordered: Vec<&(String, AddressComponent)> = self.components.iter().collect();
        ordered.sort_by_key(|(k, _)| k != Self::KEY_PROVIDER);

        let rendered = ordered
            .iter()
            .map(|(k, v)| format!("{}={}", k, render_component(v)))
            .collect::<Vec<_>>()
            .join(";");
        format!("{}{}", Self::SCHEME, rendered)
    }

    pub fn parse(url: &str) -> anyhow::Result<Address> {
        let rest = url
            .strip_prefix(Self::SCHEME)
            .ok_or_else(|| anyhow!("not an addressing url: {}", url))?;

        let mut address = Address::new();
        for component in rest.split(';') {
            let (key, value) = component
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed url component: {}", component))?;
            if key.is_empty() {
                bail!("malformed url component: {}", component);
            }
            address.set_component(key, parse_component(value));
        }
        Ok(address)
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::new()
    }
}

fn render_component(value: &AddressComponent) -> String {
    match value {
        AddressComponent::Text(s) => escape(s.as_bytes()),
        AddressComponent::Number(n) => n.to_string(),
        AddressComponent::Guid(g) => escape(format!("{{{}}}", g).to_uppercase().as_bytes()),
        AddressComponent::Binary(b) => escape(b),
    }
}

fn parse_component(value: &str) -> AddressComponent {
    if let Ok(n) = value.parse::<i32>() {
        return AddressComponent::Number(n);
    }
    let unescaped = unescape(value);
    if let Some(inner) = unescaped.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        if let Ok(guid) = Uuid::parse_str(inner) {
            return AddressComponent::Guid(guid);
        }
    }
    AddressComponent::Text(unescaped)
}

fn escape(raw: &[u8]) -> String {
    let mut result = String::with_capacity(raw.len());
    for &b in raw {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                result.push(b as char)
            }
            _ => result.push_str(&format!("%{:02X}", b)),
        }
    }
    result
}

fn unescape(escaped: &str) -> String {
    let raw = escaped.as_bytes();
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let decoded = if raw[i] == b'%' && i + 2 < raw.len() {
            hex_value(raw[i + 1]).zip(hex_value(raw[i + 2]))
        }
        else {
            None
        };
        match decoded {
            Some((hi, lo)) => {
                result.push(hi * 16 + lo);
                i += 3;
            }
            None => {
                result.push(raw[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&result).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    (c as char).to_digit(16).map(|d| d as u8)
}
