use crate::cursor::ByteCursor;
use crate::error::Error;

const CONTENT_TYPE_HANDSHAKE: u8 = 22;
const HANDSHAKE_CLIENT_HELLO: u8 = 1;
const RECORD_VERSION_TLS10: u16 = 0x0301;
const EXTENSION_SERVER_NAME: u16 = 0;

/// Server name found in a ClientHello
#[derive(Debug, PartialEq, Eq)]
pub struct ClientHelloInfo<'a> {
    /// The name exactly as it appears in the SNI extension
    pub server_name: &'a [u8],
    /// Offset of the name from the start of the inspected payload
    pub server_name_offset: usize,
}

/// Extract the SNI server name from a raw TLS record.
///
/// `payload` must start at the TLS record layer. Returns `None` for
/// anything that is not a ClientHello carrying a server_name extension;
/// truncated or malformed input is never an error and never a panic.
pub fn parse_client_hello(payload: &[u8]) -> Option<ClientHelloInfo<'_>> {
    client_hello_walk(payload).unwrap_or(None)
}

fn client_hello_walk(payload: &[u8]) -> Result<Option<ClientHelloInfo<'_>>, Error> {
    let mut r = ByteCursor::new(payload);
    if r.read_u8()? != CONTENT_TYPE_HANDSHAKE {
        return Ok(None);
    }
    // ClientHello records carry the TLS 1.0 version even for TLS 1.2/1.3
    // clients; anything else is not a candidate.
    if r.read_u16()? != RECORD_VERSION_TLS10 {
        return Ok(None);
    }
    let _record_len = r.read_u16()?;
    if r.read_u8()? != HANDSHAKE_CLIENT_HELLO {
        return Ok(None);
    }
    // read but not cross-checked against the record length
    let _handshake_len = r.read_u24()?;
    let client_version = r.read_u16()?;
    if !(0x0301..=0x0303).contains(&client_version) {
        return Ok(None);
    }
    r.skip(32)?; // client random
    let session_id_len = r.read_u8()?;
    r.skip(usize::from(session_id_len))?;
    let cipher_suites_len = r.read_u16()?;
    r.skip(usize::from(cipher_suites_len))?;
    let compression_len = r.read_u8()?;
    r.skip(usize::from(compression_len))?;

    let mut extensions_budget = usize::from(r.read_u16()?);
    while extensions_budget > 0 {
        let ext_type = r.read_u16()?;
        let ext_len = usize::from(r.read_u16()?);
        // each extension spends four framing bytes plus its body
        let framed = ext_len + 4;
        if framed > extensions_budget {
            return Ok(None);
        }
        extensions_budget -= framed;
        if ext_type == EXTENSION_SERVER_NAME {
            let _list_len = r.read_u16()?;
            let _name_type = r.read_u8()?;
            let name_len = usize::from(r.read_u16()?);
            let server_name_offset = r.position();
            let server_name = r.take(name_len)?;
            return Ok(Some(ClientHelloInfo {
                server_name,
                server_name_offset,
            }));
        }
        r.skip(ext_len)?;
    }
    Ok(None)
}
