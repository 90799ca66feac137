// Copyright (c) The quillcrypt Contributors
//
// Licensed under the Apache License, Version 2.0 (see LICENSE-APACHE) or the
// MIT license (see LICENSE-MIT), at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `PackageFactory`: opens, authenticates, and doles sub-keys out of a
//! `PackageKey` stream.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{CryptoRng, RngCore};
use sha3::{Digest, Keccak512};
use uuid::Uuid;

use crate::authority::KeyAuthority;
use crate::description::{CipherDescription, DigestKind};
use crate::engine::shx::Shx;
use crate::error::{CryptoError, Result};
use crate::kdf;
use crate::modes::ctr::Ctr;
use crate::modes::Mode;
use crate::package::key::PackageKey;
use crate::params::KeyParams;
use crate::policy::{self, package as pkg_policy, subkey as subkey_policy};
use crate::serialize::{read_i64, write_bytes, write_i64, write_u32, Codec};

/// Fixed digest and round count for the package-at-rest wrapper cipher.
/// `description.kdf_engine` (and every other package field) lives *inside*
/// the encrypted region when `PackageAuth` is set, so the wrapper itself
/// cannot depend on it without a chicken-and-egg read order; this constant
/// is this crate's resolution, independent of whatever digest a given
/// package picks for its own sub-keys.
const AT_REST_KDF: DigestKind = DigestKind::Sha512;
const AT_REST_ROUNDS: u32 = 32;
const AT_REST_EXPAND_INFO: &[u8] = b"quillcrypt-package-at-rest-key-expand";
const KEYING_MATERIAL_INFO: &[u8] = b"quillcrypt-package-keying-material";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessScope {
    NoAccess,
    Operator,
    Creator,
}

/// Parameters for `PackageFactory::create`; everything needed to build a
/// fresh `PackageKey` except the keying material itself, which is derived
/// from the supplied PRNG and digest.
pub struct PackageSpec {
    pub policy: u64,
    pub authority: KeyAuthority,
    pub description: CipherDescription,
    pub subkey_count: u32,
}

/// Owns the backing stream exclusively for its lifetime.
pub struct PackageFactory<S> {
    stream: S,
    package: PackageKey,
    local_authority: KeyAuthority,
    access_scope: AccessScope,
    is_creator: bool,
}

impl<S> PackageFactory<S> {
    pub fn access_scope(&self) -> AccessScope {
        self.access_scope
    }

    pub fn is_creator(&self) -> bool {
        self.is_creator
    }

    pub fn package(&self) -> &PackageKey {
        &self.package
    }
}

impl<S: Read + Write + Seek> PackageFactory<S> {
    /// Builds a fresh package, writes it to `stream`, and returns a factory
    /// already authenticated as `Creator`.
    pub fn create<R: RngCore + CryptoRng>(mut stream: S, spec: PackageSpec, rng: &mut R) -> Result<Self> {
        spec.description.validate()?;
        spec.authority.validate()?;
        let count = spec.subkey_count as usize;
        if !(crate::package::key::MIN_SUBKEY_COUNT..=crate::package::key::MAX_SUBKEY_COUNT).contains(&count) {
            return Err(CryptoError::InvalidArgument("subkey_count must be in 1..=100000"));
        }
        let subkey_size = spec.description.subkey_size();
        if subkey_size == 0 {
            return Err(CryptoError::InvalidArgument("subkey_size must be nonzero"));
        }

        let mut extension_key = [0u8; 16];
        rng.fill_bytes(&mut extension_key);

        let subkey_id: Vec<[u8; 16]> = (0..count).map(|_| *Uuid::new_v4().as_bytes()).collect();
        let subkey_policy = vec![0u64; count];
        let keying_material = generate_keying_material(count, subkey_size, spec.description.kdf_engine, rng)?;

        let package = PackageKey {
            policy: spec.policy,
            created_on: now_ticks(),
            authority: spec.authority,
            description: spec.description,
            extension_key,
            subkey_policy,
            subkey_id,
            keying_material,
        };
        package.validate()?;

        write_package(&mut stream, &package)?;

        Ok(Self {
            stream,
            package,
            local_authority: spec.authority,
            access_scope: AccessScope::Creator,
            is_creator: true,
        })
    }

    /// Reads and authenticates an existing package (`Authenticate`).
    pub fn open(mut stream: S, local_authority: KeyAuthority) -> Result<Self> {
        let package = read_package(&mut stream, &local_authority)?;
        let access_scope = authenticate(&package, &local_authority);
        let is_creator = access_scope == AccessScope::Creator;
        Ok(Self {
            stream,
            package,
            local_authority,
            access_scope,
            is_creator,
        })
    }

    /// Scans for the first sub-key not yet `Expired`, marks it `Expired`,
    /// and returns its material (`NextKey`).
    pub fn next_key(&mut self) -> Result<(CipherDescription, KeyParams, [u8; 16], [u8; 16])> {
        if self.access_scope != AccessScope::Creator {
            return Err(CryptoError::AccessDenied);
        }
        let index = self
            .package
            .subkey_policy
            .iter()
            .position(|&p| !policy::has(p, subkey_policy::EXPIRED))
            .ok_or(CryptoError::AlreadyExpired)?;

        let material = self.package.subkey_material(index).to_vec();
        let params = split_subkey(&self.package.description, &material);
        let key_id = self.package.subkey_id[index];
        let extension_key = self.package.extension_key;

        policy::set(&mut self.package.subkey_policy[index], subkey_policy::EXPIRED);
        write_package(&mut self.stream, &self.package)?;

        Ok((self.package.description, params, extension_key, key_id))
    }

    /// Finds the sub-key with the given id and returns its material,
    /// applying `PostOverwrite`/`SingleUse` consequences (`Extract`).
    pub fn extract<R: RngCore>(&mut self, key_id: [u8; 16], rng: &mut R) -> Result<(CipherDescription, KeyParams, [u8; 16])> {
        if self.access_scope == AccessScope::NoAccess {
            return Err(CryptoError::AccessDenied);
        }
        let index = self
            .package
            .subkey_id
            .iter()
            .position(|&id| id == key_id)
            .ok_or(CryptoError::InvalidPackage("no sub-key with that id"))?;

        let flags = self.package.subkey_policy[index];
        if policy::has(flags, subkey_policy::LOCKED) {
            return Err(CryptoError::SubkeyLocked(index));
        }
        if policy::has(flags, subkey_policy::ERASED) {
            return Err(CryptoError::SubkeyErased(index));
        }

        let material = self.package.subkey_material(index).to_vec();
        let params = split_subkey(&self.package.description, &material);
        let extension_key = self.package.extension_key;

        if policy::has(self.package.policy, pkg_policy::POST_OVERWRITE) {
            let offset = self.package.subkey_offset(index);
            let size = self.package.subkey_size();
            four_pass_overwrite(&mut self.stream, offset, size, rng)?;
            let zeroed = vec![0u8; size];
            self.package.keying_material[index * size..(index + 1) * size].copy_from_slice(&zeroed);
            policy::set(&mut self.package.subkey_policy[index], subkey_policy::ERASED);
        } else if policy::has(self.package.policy, pkg_policy::SINGLE_USE) {
            policy::set(&mut self.package.subkey_policy[index], subkey_policy::LOCKED);
        }
        write_package(&mut self.stream, &self.package)?;

        Ok((self.package.description, params, extension_key))
    }
}

fn split_subkey(desc: &CipherDescription, material: &[u8]) -> KeyParams {
    let key_size = desc.key_size as usize;
    let iv_size = desc.iv_size as usize;
    let key = material[..key_size].to_vec();
    let iv = material[key_size..key_size + iv_size].to_vec();
    let mac = material[key_size + iv_size..].to_vec();
    let mut params = KeyParams::new(key).with_iv(iv);
    if !mac.is_empty() {
        params = params.with_ikm(mac);
    }
    params
}

fn generate_keying_material<R: RngCore>(
    count: usize,
    subkey_size: usize,
    kdf_engine: DigestKind,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let mut ikm = [0u8; 64];
    let mut salt = [0u8; 128];
    rng.fill_bytes(&mut ikm);
    rng.fill_bytes(&mut salt);
    kdf::expand(kdf_engine, &ikm, &salt, KEYING_MATERIAL_INFO, count * subkey_size)
}

fn now_ticks() -> i64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_nanos() / 100) as i64
}

/// `Authenticate()`: `NoAccess` unless every policy flag
/// that is set passes its own check; `MasterAuth` shortcuts past the
/// individual checks once any identity field already matches.
fn authenticate(package: &PackageKey, local: &KeyAuthority) -> AccessScope {
    let policy = package.policy;
    let remote = &package.authority;

    if policy::has(policy, pkg_policy::MASTER_AUTH) {
        let any_match = local.target_id == remote.target_id
            || local.domain_id == remote.domain_id
            || local.package_id == remote.package_id;
        if any_match {
            return scope_for(local, remote);
        }
    }

    if policy::has(policy, pkg_policy::IDENTITY_RESTRICT) && local.target_id != remote.target_id {
        log::debug!("package authenticate: denied, target_id mismatch under IdentityRestrict");
        return AccessScope::NoAccess;
    }
    if policy::has(policy, pkg_policy::DOMAIN_RESTRICT) && local.domain_id != remote.domain_id {
        log::debug!("package authenticate: denied, domain_id mismatch under DomainRestrict");
        return AccessScope::NoAccess;
    }
    if policy::has(policy, pkg_policy::PACKAGE_AUTH) && local.package_id != remote.package_id {
        log::debug!("package authenticate: denied, package_id mismatch under PackageAuth");
        return AccessScope::NoAccess;
    }
    if policy::has(policy, pkg_policy::VOLATILE) {
        let now = now_ticks();
        if remote.option_flag != 0 && remote.option_flag < now {
            log::debug!("package authenticate: denied, Volatile expiration has passed");
            return AccessScope::NoAccess;
        }
    }
    if policy::has(policy, pkg_policy::NO_EXPORT) && local.origin_id != remote.origin_id {
        log::debug!("package authenticate: denied, origin_id mismatch under NoExport");
        return AccessScope::NoAccess;
    }

    scope_for(local, remote)
}

fn scope_for(local: &KeyAuthority, remote: &KeyAuthority) -> AccessScope {
    if local.origin_id == remote.origin_id {
        AccessScope::Creator
    } else {
        AccessScope::Operator
    }
}

/// `GetSalt`: concatenates whichever of
/// `{package_id, domain_id, target_id}` the package's own policy flags
/// select, always from the *local* authority the caller supplies (the
/// package's own embedded authority is itself encrypted when this runs).
/// The `IdentityRestrict` branch of the reference this is modeled on looks
/// like a likely defect — it copies `domain_id` into a slot sized
/// for `target_id`; this copies `target_id`, as the note recommends.
fn get_salt(policy: u64, local: &KeyAuthority) -> Vec<u8> {
    let mut salt = Vec::new();
    if policy::has(policy, pkg_policy::PACKAGE_AUTH) {
        salt.extend_from_slice(&local.package_id);
    }
    if policy::has(policy, pkg_policy::DOMAIN_RESTRICT) {
        salt.extend_from_slice(&local.domain_id);
    }
    if policy::has(policy, pkg_policy::IDENTITY_RESTRICT) {
        salt.extend_from_slice(&local.target_id);
    }
    salt
}

/// Derives the key/IV for the package-at-rest wrapper cipher: a Keccak-512
/// hash of `get_salt(...)` yields 64 bytes, of which the first 48 split into
/// a 32-byte key and 16-byte IV. SHX demands an extended
/// key of at least 192 bytes, so the 32-byte half is stretched to 192 bytes
/// through one more HMAC-KDF pass before being handed to the engine; the
/// 16-byte half is used directly as the CTR IV.
fn derive_at_rest_params(policy: u64, local: &KeyAuthority) -> Result<KeyParams> {
    let salt_input = get_salt(policy, local);
    let digest = Keccak512::digest(&salt_input);
    let key32 = &digest[..32];
    let iv16 = &digest[32..48];
    let extended_key = kdf::expand(AT_REST_KDF, key32, iv16, AT_REST_EXPAND_INFO, 192)?;
    Ok(KeyParams::new(extended_key).with_iv(iv16.to_vec()))
}

fn transform_at_rest(data: &mut [u8], policy: u64, local: &KeyAuthority) -> Result<()> {
    let params = derive_at_rest_params(policy, local)?;
    let engine = Shx::new(AT_REST_ROUNDS);
    let mut ctr = Ctr::new(engine, AT_REST_KDF, crate::exec::Execution::linear());
    ctr.init(true, &params)?;
    let mut out = vec![0u8; data.len()];
    ctr.transform(data, &mut out)?;
    data.copy_from_slice(&out);
    Ok(())
}

fn write_package<S: Write + Seek>(stream: &mut S, package: &PackageKey) -> Result<()> {
    let mut rest = Vec::new();
    write_i64(&mut rest, package.created_on)?;
    package.authority.encode(&mut rest)?;
    package.description.encode(&mut rest)?;
    write_bytes(&mut rest, &package.extension_key)?;
    write_u32(&mut rest, package.subkey_count() as u32)?;
    for &p in &package.subkey_policy {
        write_i64(&mut rest, p as i64)?;
    }
    for id in &package.subkey_id {
        write_bytes(&mut rest, id)?;
    }
    write_bytes(&mut rest, &package.keying_material)?;

    if policy::has(package.policy, pkg_policy::PACKAGE_AUTH) {
        transform_at_rest(&mut rest, package.policy, &package.authority)?;
    }

    stream.seek(SeekFrom::Start(0))?;
    write_i64(stream, package.policy as i64)?;
    stream.write_all(&rest)?;
    Ok(())
}

fn read_package<S: Read + Seek>(stream: &mut S, local_authority: &KeyAuthority) -> Result<PackageKey> {
    stream.seek(SeekFrom::Start(0))?;
    let policy = read_i64(stream)? as u64;
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest)?;

    if policy::has(policy, pkg_policy::PACKAGE_AUTH) {
        transform_at_rest(&mut rest, policy, local_authority)?;
    }

    let mut full = Vec::with_capacity(8 + rest.len());
    write_i64(&mut full, policy as i64)?;
    full.extend_from_slice(&rest);
    let mut cur = Cursor::new(full);
    PackageKey::decode(&mut cur)
}

/// Four-pass in-place erasure of a sub-key's byte range: random, reversed
/// random, all-ones, all-zeros (`PostOverwrite`).
fn four_pass_overwrite<S: Write + Seek, R: RngCore>(stream: &mut S, offset: usize, len: usize, rng: &mut R) -> Result<()> {
    let mut buf = vec![0u8; len];

    rng.fill_bytes(&mut buf);
    write_pass(stream, offset, &buf)?;

    buf.reverse();
    write_pass(stream, offset, &buf)?;

    buf.iter_mut().for_each(|b| *b = 0xff);
    write_pass(stream, offset, &buf)?;

    buf.iter_mut().for_each(|b| *b = 0x00);
    write_pass(stream, offset, &buf)?;

    Ok(())
}

fn write_pass<S: Write + Seek>(stream: &mut S, offset: usize, buf: &[u8]) -> Result<()> {
    stream.seek(SeekFrom::Start(offset as u64))?;
    stream.write_all(buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{CipherMode, EngineType, PaddingMode};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::io::Cursor;

    fn description() -> CipherDescription {
        CipherDescription {
            engine_type: EngineType::Shx,
            key_size: 32,
            iv_size: 16,
            cipher_mode: CipherMode::Ctr,
            padding_mode: PaddingMode::None,
            block_size: 16,
            round_count: 32,
            kdf_engine: DigestKind::Sha512,
            mac_size: 0,
            mac_engine: DigestKind::Sha256,
        }
    }

    fn authority() -> KeyAuthority {
        KeyAuthority::from_fields(b"alpha", b"origin-8", b"target", b"pkg", b"tag", 0, 0)
    }

    #[test]
    fn create_then_next_key_three_times_then_exhausted() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let spec = PackageSpec {
            policy: 0,
            authority: authority(),
            description: description(),
            subkey_count: 3,
        };
        let stream = Cursor::new(Vec::new());
        let mut factory = PackageFactory::create(stream, spec, &mut rng).unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let (_, _, _, key_id) = factory.next_key().unwrap();
            ids.push(key_id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        assert!(matches!(factory.next_key(), Err(CryptoError::AlreadyExpired)));
    }

    #[test]
    fn reload_after_next_key_authenticates_as_creator() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let spec = PackageSpec {
            policy: 0,
            authority: authority(),
            description: description(),
            subkey_count: 2,
        };
        let mut factory = PackageFactory::create(Cursor::new(Vec::new()), spec, &mut rng).unwrap();
        factory.next_key().unwrap();

        let bytes = factory.stream.into_inner();
        let reopened = PackageFactory::open(Cursor::new(bytes), authority()).unwrap();
        assert_eq!(reopened.access_scope(), AccessScope::Creator);
    }

    #[test]
    fn post_overwrite_zeroes_the_subkey_slot_on_extract() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let spec = PackageSpec {
            policy: pkg_policy::POST_OVERWRITE,
            authority: authority(),
            description: description(),
            subkey_count: 1,
        };
        let mut factory = PackageFactory::create(Cursor::new(Vec::new()), spec, &mut rng).unwrap();
        let (_, _, _, key_id) = factory.next_key().unwrap();

        let (_, _, _) = factory.extract(key_id, &mut rng).unwrap();

        let offset = factory.package.subkey_offset(0);
        let size = factory.package.subkey_size();
        let bytes = factory.stream.get_ref();
        assert!(bytes[offset..offset + size].iter().all(|&b| b == 0));
        assert!(policy::has(factory.package.subkey_policy[0], subkey_policy::ERASED));
    }

    #[test]
    fn domain_restrict_denies_mismatched_domain() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let spec = PackageSpec {
            policy: pkg_policy::DOMAIN_RESTRICT,
            authority: KeyAuthority::from_fields(b"alpha", b"origin-8", b"target", b"pkg", b"tag", 0, 0),
            description: description(),
            subkey_count: 1,
        };
        let factory = PackageFactory::create(Cursor::new(Vec::new()), spec, &mut rng).unwrap();
        let bytes = factory.stream.into_inner();

        let mismatched = KeyAuthority::from_fields(b"beta", b"origin-8", b"target", b"pkg", b"tag", 0, 0);
        let reopened = PackageFactory::open(Cursor::new(bytes), mismatched).unwrap();
        assert_eq!(reopened.access_scope(), AccessScope::NoAccess);
    }

    #[test]
    fn package_auth_round_trips_at_rest_encryption() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let spec = PackageSpec {
            policy: pkg_policy::PACKAGE_AUTH,
            authority: authority(),
            description: description(),
            subkey_count: 2,
        };
        let factory = PackageFactory::create(Cursor::new(Vec::new()), spec, &mut rng).unwrap();
        let bytes = factory.stream.into_inner();

        let reopened = PackageFactory::open(Cursor::new(bytes), authority()).unwrap();
        assert_eq!(reopened.access_scope(), AccessScope::Creator);
        assert_eq!(reopened.package().subkey_count(), 2);
    }

    /// Pins the `IdentityRestrict` salt fix: the at-rest salt must depend
    /// on `target_id`, not
    /// `domain_id`, even when the two differ.
    #[test]
    fn salt_uses_target_id_under_identity_restrict() {
        let policy = pkg_policy::IDENTITY_RESTRICT;
        let a = KeyAuthority::from_fields(b"domain-a", b"origin-8", b"target-a", b"pkg", b"tag", 0, 0);
        let b = KeyAuthority::from_fields(b"domain-b", b"origin-8", b"target-a", b"pkg", b"tag", 0, 0);
        // Same target_id, different domain_id: the salt must match.
        assert_eq!(get_salt(policy, &a), get_salt(policy, &b));

        let c = KeyAuthority::from_fields(b"domain-a", b"origin-8", b"target-c", b"pkg", b"tag", 0, 0);
        // Different target_id, same domain_id: the salt must differ.
        assert_ne!(get_salt(policy, &a), get_salt(policy, &c));
    }
}
