use anyhow::{anyhow, Result};
use bytecheck::CheckBytes;
use rkyv::ser::serializers::AllocSerializer;
use rkyv::ser::Serializer;
use rkyv::validation::validators::DefaultValidator;
use rkyv::{archived_root, check_archived_root, Archive, Archived, Deserialize, Serialize};
use std::marker::PhantomData;

fn archive<T>(t: &T) -> Vec<u8>
where
    T: Serialize<AllocSerializer<256>>,
{
    let mut ser = AllocSerializer::<256>::default();
    ser.serialize_value(t).unwrap();
    ser.into_serializer().into_inner().to_vec()
}

/// A handle to `T`'s archived (rkyv) byte representation, used both for
/// persisted driver values and for the sync wire format.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Ref<T> {
    marker: PhantomData<T>,
    bytes: Vec<u8>,
}

impl<T: Archive> Ref<T> {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            marker: PhantomData,
            bytes,
        }
    }

    pub fn archive(t: &T) -> Self
    where
        T: Serialize<AllocSerializer<256>>,
    {
        Self::new(archive(t))
    }

    /// Validates untrusted bytes (received over the wire) before exposing
    /// the archived view — every document arriving from a remote peer must
    /// go through this, never the unchecked [`Self::new`] path.
    pub fn checked(bytes: &[u8]) -> Result<Self>
    where
        Archived<T>: for<'a> CheckBytes<DefaultValidator<'a>>,
    {
        check_archived_root::<T>(bytes).map_err(|err| anyhow!("{}", err))?;
        Ok(Self::new(bytes.to_vec()))
    }

    pub fn to_owned(&self) -> Result<T>
    where
        Archived<T>: Deserialize<T, rkyv::Infallible>,
    {
        Ok(self.as_ref().deserialize(&mut rkyv::Infallible)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T: Archive> AsRef<Archived<T>> for Ref<T> {
    fn as_ref(&self) -> &Archived<T> {
        unsafe { archived_root::<T>(&self.bytes[..]) }
    }
}
