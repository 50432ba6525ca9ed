use std::collections::BTreeMap;

use anyhow::{Context, Error};
use clap::Parser;
use clap_stdin::MaybeStdin;
use coset::CborSerializable;
use mdoc_core::definitions::device_request::{DataElements, Namespaces};
use mdoc_core::{CoseKeyPrivate, DeviceRequest, EC2Curve, Security};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, clap::Subcommand)]
enum Action {
    /// Print the doc types, namespaces and element identifiers requested in a DeviceRequest.
    GetNamespaces {
        /// Hex encoded CBOR DeviceRequest.
        request: MaybeStdin<String>,
    },
    /// Generate a private key and print it as a base64 encoded COSE_Key.
    GenerateKey {
        #[arg(long, value_enum, default_value_t = Curve::P256)]
        curve: Curve,
    },
    /// Print the hex encoded device engagement Security structure advertising a key.
    PublicKey {
        /// Base64 encoded private COSE_Key, as printed by `generate-key`.
        key: MaybeStdin<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Curve {
    P256,
    P384,
    P521,
}

impl From<Curve> for EC2Curve {
    fn from(curve: Curve) -> EC2Curve {
        match curve {
            Curve::P256 => EC2Curve::P256,
            Curve::P384 => EC2Curve::P384,
            Curve::P521 => EC2Curve::P521,
        }
    }
}

fn main() -> Result<(), Error> {
    let output = match Args::parse().action {
        Action::GetNamespaces { request } => print_namespaces(request.to_string())?,
        Action::GenerateKey { curve } => generate_key(curve.into())?,
        Action::PublicKey { key } => public_key(key.to_string())?,
    };
    println!("{output}");
    Ok(())
}

fn print_namespaces(request: String) -> Result<String, Error> {
    let bytes = hex::decode(request.trim()).context("request is not hex encoded")?;
    let request = DeviceRequest::from_slice(&bytes)
        .map_err(|e| anyhow::anyhow!("could not parse DeviceRequest: {e}"))?;
    let mut claims: BTreeMap<String, Namespaces> = BTreeMap::new();
    for items in request.items_requests() {
        let namespaces = claims.entry(items.doc_type.clone()).or_default();
        for (namespace, elements) in &items.namespaces {
            namespaces
                .entry(namespace.clone())
                .or_insert_with(DataElements::new)
                .extend(elements.iter().map(|(k, v)| (k.clone(), *v)));
        }
    }
    Ok(serde_json::to_string_pretty(&claims)?)
}

fn generate_key(curve: EC2Curve) -> Result<String, Error> {
    Ok(CoseKeyPrivate::generate(curve).to_base64()?)
}

fn public_key(key: String) -> Result<String, Error> {
    let key = CoseKeyPrivate::from_base64(key.trim()).context("could not parse private key")?;
    let security = Security::new(key.public_key().clone())?;
    let bytes = security
        .to_vec()
        .map_err(|e| anyhow::anyhow!("could not encode Security: {e}"))?;
    Ok(hex::encode(bytes))
}
