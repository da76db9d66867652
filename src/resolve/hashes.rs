//! Streaming file digests for declared element hashes and bag manifests

use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::request::HashFunction;

const BUFFER_SIZE: usize = 64 * 1024;

enum Digester {
    Md5(md5::Context),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Digester {
    fn new(function: HashFunction) -> Self {
        match function {
            HashFunction::Md5 => Digester::Md5(md5::Context::new()),
            HashFunction::Sha256 => Digester::Sha256(Sha256::new()),
            HashFunction::Sha512 => Digester::Sha512(Sha512::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Md5(ctx) => ctx.consume(data),
            Digester::Sha256(hasher) => hasher.update(data),
            Digester::Sha512(hasher) => hasher.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Digester::Md5(ctx) => format!("{:x}", ctx.compute()),
            Digester::Sha256(hasher) => format!("{:x}", hasher.finalize()),
            Digester::Sha512(hasher) => format!("{:x}", hasher.finalize()),
        }
    }
}

/// Lowercase hex digest of a file. Blocking.
pub fn digest_file(path: &Path, function: HashFunction) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut digester = Digester::new(function);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        digester.update(&buffer[..read]);
    }

    Ok(digester.finish())
}

/// Map a bag manifest algorithm suffix (`manifest-<alg>.txt`) to a hash function
pub fn from_bagit_name(name: &str) -> Option<HashFunction> {
    match name.to_ascii_lowercase().as_str() {
        "md5" => Some(HashFunction::Md5),
        "sha256" => Some(HashFunction::Sha256),
        "sha512" => Some(HashFunction::Sha512),
        _ => None,
    }
}
