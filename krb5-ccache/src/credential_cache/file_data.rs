use super::{credential::CONF_REALM, Address, AuthData, Credential, CredentialCache, TicketTimes};
use crate::{Enctype, Error, Keyblock, NameType, Principal};
use anyhow::Context;
use nom::{
    combinator::{all_consuming, map, map_res, verify},
    multi::{count, length_count, length_data, many0},
    number::complete::{be_i16, be_i32, be_u16, be_u32, be_u8},
    sequence::tuple,
    IResult,
};

const FILE_FIRST_BYTE: u8 = 5;
const FILE_FORMAT_VERSION: u8 = 4;
const FCC_TAG_DELTATIME: u16 = 1;
const DELTATIME_SIZE: u16 = 8;

/// KDC clock offset relative to the client, kept in the version 4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdcTimeOffset {
    pub seconds: i32,
    pub microseconds: i32,
}

// The first byte of the file always has the value 5, and the second byte
// contains the version number. Only version 4 is written and read here; it
// always uses big-endian integers.
pub(super) fn decode(data: &[u8]) -> anyhow::Result<CredentialCache> {
    match data {
        [FILE_FIRST_BYTE, FILE_FORMAT_VERSION, ..] => (),
        [FILE_FIRST_BYTE, 1..=3, ..] => Err(Error::KRB5_CCACHE_BADVNO)?,
        _ => Err(Error::KRB5_CC_FORMAT).context("missing credentials cache magic")?,
    }
    let (_, cache) = all_consuming(ccache)(&data[2..]).map_err(format_error)?;
    Ok(cache)
}

fn format_error(err: nom::Err<nom::error::Error<&[u8]>>) -> anyhow::Error {
    let detail = match err {
        nom::Err::Incomplete(_) => "truncated input".to_owned(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("{:?} with {} bytes remaining", e.code, e.input.len())
        }
    };
    anyhow::Error::new(Error::KRB5_CC_FORMAT).context(detail)
}

// After the two-byte version indicator, the file has three parts:
// - the header,
// - the default principal name,
// - and a sequence of credentials, which ends when the file ends.
fn ccache(input: &[u8]) -> IResult<&[u8], CredentialCache> {
    let (input, time_offset) = header(input)?;
    let (input, default_principal) = principal(input)?;
    let (input, credentials) = many0(credential)(input)?;
    let cache = CredentialCache {
        default_principal,
        time_offset,
        credentials,
    };
    Ok((input, cache))
}

// The header begins with a 16-bit integer giving the length of the entire
// header, followed by a sequence of fields. Each field consists of a 16-bit
// tag, a 16-bit length, and a value of the given length. Fields with unknown
// tags are ignored.
fn header(input: &[u8]) -> IResult<&[u8], Option<KdcTimeOffset>> {
    let (input, fields) = length_data(be_u16)(input)?;
    let (_, fields) = all_consuming(many0(header_field))(fields)?;
    Ok((input, fields.into_iter().flatten().last()))
}

fn header_field(input: &[u8]) -> IResult<&[u8], Option<KdcTimeOffset>> {
    let (input, tag) = be_u16(input)?;
    let (input, value) = length_data(be_u16)(input)?;
    if tag != FCC_TAG_DELTATIME {
        return Ok((input, None));
    }
    let (_, (seconds, microseconds)) = all_consuming(tuple((be_i32, be_i32)))(value)?;
    let offset = KdcTimeOffset {
        seconds,
        microseconds,
    };
    Ok((input, Some(offset)))
}

// principal ::=
//     name type (32 bits)
//     count of components (32 bits)
//     realm (data)
//     component1 (data)
//     component2 (data)
//     ...
// data ::=
//     length (32 bits)
//     value (length bytes)
fn principal(input: &[u8]) -> IResult<&[u8], Principal> {
    verify(principal_fields, is_reconstructable)(input)
}

fn principal_fields(input: &[u8]) -> IResult<&[u8], Principal> {
    let (input, name_type) = be_i32(input)?;
    let (input, component_count) = be_u32(input)?;
    let (input, realm) = string(input)?;
    let (input, components) = count(string, component_count as usize)(input)?;
    let principal = Principal {
        name_type: NameType(name_type),
        realm,
        components,
    };
    Ok((input, principal))
}

// Configuration entries embed a full principal name as a component, so they
// are exempt from the name check.
fn is_reconstructable(principal: &Principal) -> bool {
    principal.realm == CONF_REALM || principal.is_well_formed()
}

fn string(input: &[u8]) -> IResult<&[u8], String> {
    map(map_res(length_data(be_u32), std::str::from_utf8), str::to_owned)(input)
}

fn data(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(length_data(be_u32), <[u8]>::to_vec)(input)
}

// credential ::=
//     client (principal)
//     server (principal)
//     keyblock (keyblock)
//     authtime (32 bits)
//     starttime (32 bits)
//     endtime (32 bits)
//     renew_till (32 bits)
//     is_skey (1 byte, 0 or 1)
//     ticket_flags (32 bits)
//     addresses (addresses)
//     authdata (authdata)
//     ticket (data)
//     second_ticket (data)
// keyblock ::=
//     enctype (16 bits)
//     data
// addresses ::=
//     count (32 bits)
//     address1
//     ...
// address ::=
//     addrtype (16 bits)
//     data
// authdata ::=
//     count (32 bits)
//     authdata1
//     ...
// authdata ::=
//     ad_type (16 bits)
//     data
fn credential(input: &[u8]) -> IResult<&[u8], Credential> {
    let (input, client) = principal(input)?;
    let (input, server) = principal(input)?;
    let (input, keyblock) = keyblock(input)?;
    let (input, times) = ticket_times(input)?;
    let (input, is_skey) = map(be_u8, |b| b != 0)(input)?;
    let (input, ticket_flags) = be_i32(input)?;
    let (input, addresses) = length_count(be_u32, address)(input)?;
    let (input, authdata) = length_count(be_u32, authdata)(input)?;
    let (input, ticket) = data(input)?;
    let (input, second_ticket) = data(input)?;
    let credential = Credential {
        client,
        server,
        keyblock,
        times,
        is_skey,
        ticket_flags,
        addresses,
        authdata,
        ticket,
        second_ticket,
    };
    Ok((input, credential))
}

fn keyblock(input: &[u8]) -> IResult<&[u8], Keyblock> {
    let (input, enctype) = be_i16(input)?;
    let (input, contents) = data(input)?;
    let keyblock = Keyblock {
        enctype: Enctype(enctype),
        contents,
    };
    Ok((input, keyblock))
}

fn ticket_times(input: &[u8]) -> IResult<&[u8], TicketTimes> {
    let (input, (authtime, starttime, endtime, renew_till)) =
        tuple((be_i32, be_i32, be_i32, be_i32))(input)?;
    let times = TicketTimes {
        authtime,
        starttime,
        endtime,
        renew_till,
    };
    Ok((input, times))
}

fn address(input: &[u8]) -> IResult<&[u8], Address> {
    let (input, addrtype) = be_u16(input)?;
    let (input, contents) = data(input)?;
    Ok((input, Address { addrtype, contents }))
}

fn authdata(input: &[u8]) -> IResult<&[u8], AuthData> {
    let (input, ad_type) = be_u16(input)?;
    let (input, contents) = data(input)?;
    Ok((input, AuthData { ad_type, contents }))
}

pub(super) fn encode(cache: &CredentialCache) -> anyhow::Result<Vec<u8>> {
    let mut writer = Writer::default();
    writer.write_u8(FILE_FIRST_BYTE);
    writer.write_u8(FILE_FORMAT_VERSION);
    writer.write_header(cache.time_offset);
    writer.write_principal(&cache.default_principal)?;
    for credential in &cache.credentials {
        writer.write_credential(credential)?;
    }
    Ok(writer.buf)
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

macro_rules! write_int {
    ($fn:ident, $type:ident) => {
        fn $fn(&mut self, value: $type) {
            self.buf.extend_from_slice(&value.to_be_bytes());
        }
    };
}

impl Writer {
    write_int!(write_u8, u8);
    write_int!(write_u16, u16);
    write_int!(write_i16, i16);
    write_int!(write_i32, i32);
    write_int!(write_u32, u32);

    fn write_count(&mut self, count: usize) -> anyhow::Result<()> {
        let count = u32::try_from(count)
            .map_err(|_| Error::KRB5_CC_FORMAT)
            .context("length does not fit in 32 bits")?;
        self.write_u32(count);
        Ok(())
    }

    fn write_data(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.write_count(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn write_header(&mut self, time_offset: Option<KdcTimeOffset>) {
        match time_offset {
            None => self.write_u16(0),
            Some(offset) => {
                self.write_u16(4 + DELTATIME_SIZE);
                self.write_u16(FCC_TAG_DELTATIME);
                self.write_u16(DELTATIME_SIZE);
                self.write_i32(offset.seconds);
                self.write_i32(offset.microseconds);
            }
        }
    }

    fn write_principal(&mut self, principal: &Principal) -> anyhow::Result<()> {
        self.write_i32(principal.name_type.0);
        self.write_count(principal.components.len())?;
        self.write_data(principal.realm.as_bytes())?;
        for component in &principal.components {
            self.write_data(component.as_bytes())?;
        }
        Ok(())
    }

    fn write_credential(&mut self, credential: &Credential) -> anyhow::Result<()> {
        self.write_principal(&credential.client)?;
        self.write_principal(&credential.server)?;
        self.write_i16(credential.keyblock.enctype.0);
        self.write_data(&credential.keyblock.contents)?;
        let times = &credential.times;
        for time in [times.authtime, times.starttime, times.endtime, times.renew_till] {
            self.write_i32(time);
        }
        self.write_u8(u8::from(credential.is_skey));
        self.write_i32(credential.ticket_flags);
        self.write_count(credential.addresses.len())?;
        for address in &credential.addresses {
            self.write_u16(address.addrtype);
            self.write_data(&address.contents)?;
        }
        self.write_count(credential.authdata.len())?;
        for authdata in &credential.authdata {
            self.write_u16(authdata.ad_type);
            self.write_data(&authdata.contents)?;
        }
        self.write_data(&credential.ticket)?;
        self.write_data(&credential.second_ticket)?;
        Ok(())
    }
}
