//! The request sent by an mdoc reader for data elements of one or more documents.
//!
//! ```cddl
//! DeviceRequest = {
//!     "version" : tstr,
//!     "docRequests" : [+ DocRequest]
//! }
//! DocRequest = {
//!     "itemsRequest" : ItemsRequestBytes,     ; #6.24(bstr .cbor ItemsRequest)
//!     ? "readerAuth" : ReaderAuth
//! }
//! ItemsRequest = {
//!     "docType" : DocType,
//!     "nameSpaces" : { + NameSpace => { + DataElementIdentifier => IntentToRetain } },
//!     ? "requestInfo" : { * tstr => any }
//! }
//! ```
use std::collections::BTreeMap;

use ciborium::Value;
use coset::{AsCborValue, CborSerializable, CoseError, CoseSign1};
use serde::{ser, Deserialize, Serialize, Serializer};

use crate::cbor;
use crate::definitions::helpers::tag24::Error as Tag24Error;
use crate::definitions::helpers::{NonEmptyVec, Tag24};

pub type ItemsRequestBytes = Tag24<ItemsRequest>;
pub type DocType = String;
pub type NameSpace = String;
pub type IntentToRetain = bool;
pub type DataElementIdentifier = String;
pub type DataElements = BTreeMap<DataElementIdentifier, IntentToRetain>;
pub type Namespaces = BTreeMap<NameSpace, DataElements>;
pub type RequestInfo = BTreeMap<String, Value>;
pub type ReaderAuth = CoseSign1;

pub const MDL_DOC_TYPE: &str = "org.iso.18013.5.1.mDL";
pub const MDL_NAMESPACE: &str = "org.iso.18013.5.1";
pub const DEFAULT_INTENT_TO_RETAIN: IntentToRetain = true;

const VERSION: &str = "version";
const DOC_REQUESTS: &str = "docRequests";
const ITEMS_REQUEST: &str = "itemsRequest";
const READER_AUTH: &str = "readerAuth";
const DOC_TYPE: &str = "docType";
const NAME_SPACES: &str = "nameSpaces";
const REQUEST_INFO: &str = "requestInfo";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct DeviceRequest {
    pub version: String,
    pub doc_requests: NonEmptyVec<DocRequest>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct DocRequest {
    pub items_request: ItemsRequestBytes,
    pub reader_auth: Option<ReaderAuth>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ItemsRequest {
    pub doc_type: DocType,
    pub namespaces: Namespaces,
    pub request_info: Option<RequestInfo>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} should be a CBOR map")]
    NotAMap(&'static str),
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' should be a {expected}, received: '{received}'")]
    InvalidType {
        field: &'static str,
        expected: &'static str,
        received: &'static str,
    },
    #[error("unsupported DeviceRequest version '{0}'")]
    UnsupportedVersion(String),
    #[error("DeviceRequest holds no valid DocRequest")]
    NoDocRequests,
    #[error("unable to handle ItemsRequestBytes: {0}")]
    ItemsRequest(#[from] Tag24Error),
    #[error("unable to parse readerAuth: {0}")]
    ReaderAuth(coset::CoseError),
}

impl DeviceRequest {
    pub const VERSION: &'static str = "1.0";

    /// Builds a request for the given documents.
    pub fn new(version: impl Into<String>, documents: Vec<DocumentRequest>) -> Result<Self, Error> {
        let version = version.into();
        check_version(&version)?;
        let doc_requests = documents
            .iter()
            .map(DocumentRequest::doc_request)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            version,
            doc_requests: NonEmptyVec::try_from(doc_requests).map_err(|_| Error::NoDocRequests)?,
        })
    }

    /// Requests `elements` and the `age_over_NN` attestations for `ages_over` from a single
    /// namespace of one document type, all with the same intent to retain.
    pub fn for_namespace(
        doc_type: impl Into<DocType>,
        namespace: &str,
        elements: &[&str],
        ages_over: &[u8],
        intent_to_retain: IntentToRetain,
    ) -> Result<Self, Error> {
        let elements = elements
            .iter()
            .map(|element| ElementToRequest::new(namespace, *element, intent_to_retain))
            .chain(
                ages_over
                    .iter()
                    .map(|age| ElementToRequest::age_over(namespace, *age, intent_to_retain)),
            )
            .collect();
        Self::new(
            Self::VERSION,
            vec![DocumentRequest::new(doc_type, elements)],
        )
    }

    /// Requests elements of the ISO/IEC 18013-5 mobile driving licence.
    pub fn mdl(
        elements: &[&str],
        ages_over: &[u8],
        intent_to_retain: IntentToRetain,
    ) -> Result<Self, Error> {
        Self::for_namespace(
            MDL_DOC_TYPE,
            MDL_NAMESPACE,
            elements,
            ages_over,
            intent_to_retain,
        )
    }

    pub fn items_requests(&self) -> impl Iterator<Item = &ItemsRequest> {
        self.doc_requests.iter().map(|r| r.items_request.as_ref())
    }
}

fn check_version(version: &str) -> Result<(), Error> {
    if version.starts_with('1') {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion(version.to_string()))
    }
}

impl DocRequest {
    pub fn new(items_request: ItemsRequest) -> Result<Self, Error> {
        Ok(Self {
            items_request: Tag24::new(items_request)?,
            reader_auth: None,
        })
    }
}

/// A single data element to request, used to build an [ItemsRequest].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementToRequest {
    pub namespace: NameSpace,
    pub element_identifier: DataElementIdentifier,
    pub intent_to_retain: IntentToRetain,
}

impl ElementToRequest {
    pub fn new(
        namespace: impl Into<NameSpace>,
        element_identifier: impl Into<DataElementIdentifier>,
        intent_to_retain: IntentToRetain,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            element_identifier: element_identifier.into(),
            intent_to_retain,
        }
    }

    /// Requests an element with [DEFAULT_INTENT_TO_RETAIN].
    pub fn retained(
        namespace: impl Into<NameSpace>,
        element_identifier: impl Into<DataElementIdentifier>,
    ) -> Self {
        Self::new(namespace, element_identifier, DEFAULT_INTENT_TO_RETAIN)
    }

    /// The `age_over_NN` attestation for `age`.
    pub fn age_over(namespace: impl Into<NameSpace>, age: u8, intent_to_retain: IntentToRetain) -> Self {
        Self::new(namespace, format!("age_over_{age:02}"), intent_to_retain)
    }
}

/// The elements requested from one document type.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentRequest {
    pub doc_type: DocType,
    pub elements: Vec<ElementToRequest>,
    pub request_info: Option<RequestInfo>,
}

impl DocumentRequest {
    pub fn new(doc_type: impl Into<DocType>, elements: Vec<ElementToRequest>) -> Self {
        Self {
            doc_type: doc_type.into(),
            elements,
            request_info: None,
        }
    }

    pub fn with_request_info(mut self, request_info: RequestInfo) -> Self {
        self.request_info = Some(request_info);
        self
    }

    /// Groups the elements by namespace. When an element is listed more than once the
    /// last intent to retain wins.
    pub fn items_request(&self) -> ItemsRequest {
        let mut namespaces = Namespaces::new();
        for element in &self.elements {
            namespaces
                .entry(element.namespace.clone())
                .or_default()
                .insert(element.element_identifier.clone(), element.intent_to_retain);
        }
        ItemsRequest {
            doc_type: self.doc_type.clone(),
            namespaces,
            request_info: self.request_info.clone(),
        }
    }

    pub fn doc_request(&self) -> Result<DocRequest, Error> {
        DocRequest::new(self.items_request())
    }
}

impl TryFrom<DeviceRequest> for Value {
    type Error = CoseError;

    fn try_from(request: DeviceRequest) -> Result<Value, CoseError> {
        let doc_requests = request
            .doc_requests
            .into_inner()
            .into_iter()
            .map(Value::try_from)
            .collect::<Result<Vec<Value>, CoseError>>()?;
        Ok(Value::Map(vec![
            (cbor::text_key(VERSION), Value::Text(request.version)),
            (cbor::text_key(DOC_REQUESTS), Value::Array(doc_requests)),
        ]))
    }
}

impl TryFrom<Value> for DeviceRequest {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        let mut map = cbor::into_map(v).ok_or(Error::NotAMap("DeviceRequest"))?;
        let version = take_text(&mut map, VERSION)?;
        check_version(&version)?;
        let doc_requests = match take_field(&mut map, DOC_REQUESTS)? {
            Value::Array(doc_requests) => doc_requests,
            other => {
                return Err(Error::InvalidType {
                    field: DOC_REQUESTS,
                    expected: "array",
                    received: cbor::kind(&other),
                })
            }
        };
        let doc_requests: Vec<DocRequest> = doc_requests
            .into_iter()
            .enumerate()
            .filter_map(|(index, doc_request)| match DocRequest::try_from(doc_request) {
                Ok(doc_request) => Some(doc_request),
                Err(error) => {
                    tracing::warn!(index, %error, "dropping undecodable DocRequest");
                    None
                }
            })
            .collect();
        Ok(DeviceRequest {
            version,
            doc_requests: NonEmptyVec::try_from(doc_requests).map_err(|_| Error::NoDocRequests)?,
        })
    }
}

impl TryFrom<DocRequest> for Value {
    type Error = CoseError;

    fn try_from(request: DocRequest) -> Result<Value, CoseError> {
        let mut map = vec![(
            cbor::text_key(ITEMS_REQUEST),
            request.items_request.into(),
        )];
        if let Some(reader_auth) = request.reader_auth {
            map.push((cbor::text_key(READER_AUTH), reader_auth.to_cbor_value()?));
        }
        Ok(Value::Map(map))
    }
}

impl TryFrom<Value> for DocRequest {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        let mut map = cbor::into_map(v).ok_or(Error::NotAMap("DocRequest"))?;
        let items_request = ItemsRequestBytes::try_from(take_field(&mut map, ITEMS_REQUEST)?)?;
        let reader_auth = cbor::remove_entry(&mut map, &cbor::text_key(READER_AUTH))
            .map(CoseSign1::from_cbor_value)
            .transpose()
            .map_err(Error::ReaderAuth)?;
        Ok(DocRequest {
            items_request,
            reader_auth,
        })
    }
}

impl From<ItemsRequest> for Value {
    fn from(request: ItemsRequest) -> Value {
        let namespaces = request
            .namespaces
            .into_iter()
            .map(|(namespace, elements)| {
                let elements = elements
                    .into_iter()
                    .map(|(element, intent)| (Value::Text(element), Value::Bool(intent)))
                    .collect();
                (Value::Text(namespace), Value::Map(elements))
            })
            .collect();
        let mut map = vec![
            (cbor::text_key(DOC_TYPE), Value::Text(request.doc_type)),
            (cbor::text_key(NAME_SPACES), Value::Map(namespaces)),
        ];
        if let Some(request_info) = request.request_info {
            let request_info = request_info
                .into_iter()
                .map(|(k, v)| (Value::Text(k), v))
                .collect();
            map.push((cbor::text_key(REQUEST_INFO), Value::Map(request_info)));
        }
        Value::Map(map)
    }
}

impl TryFrom<Value> for ItemsRequest {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self, Error> {
        let mut map = cbor::into_map(v).ok_or(Error::NotAMap("ItemsRequest"))?;
        let doc_type = take_text(&mut map, DOC_TYPE)?;
        let namespaces = text_keyed_map(take_field(&mut map, NAME_SPACES)?, NAME_SPACES)?
            .into_iter()
            .map(|(namespace, elements)| {
                let elements = text_keyed_map(elements, NAME_SPACES)?
                    .into_iter()
                    .map(|(element, intent)| match intent {
                        Value::Bool(intent) => Ok((element, intent)),
                        other => Err(Error::InvalidType {
                            field: NAME_SPACES,
                            expected: "bool",
                            received: cbor::kind(&other),
                        }),
                    })
                    .collect::<Result<DataElements, Error>>()?;
                Ok((namespace, elements))
            })
            .collect::<Result<Namespaces, Error>>()?;
        let request_info = cbor::remove_entry(&mut map, &cbor::text_key(REQUEST_INFO))
            .map(|info| text_keyed_map(info, REQUEST_INFO).map(RequestInfo::from_iter))
            .transpose()?;
        Ok(ItemsRequest {
            doc_type,
            namespaces,
            request_info,
        })
    }
}

fn take_field(map: &mut Vec<(Value, Value)>, field: &'static str) -> Result<Value, Error> {
    cbor::remove_entry(map, &cbor::text_key(field)).ok_or(Error::MissingField(field))
}

fn take_text(map: &mut Vec<(Value, Value)>, field: &'static str) -> Result<String, Error> {
    match take_field(map, field)? {
        Value::Text(text) => Ok(text),
        other => Err(Error::InvalidType {
            field,
            expected: "tstr",
            received: cbor::kind(&other),
        }),
    }
}

/// The entries of a map whose keys must all be text strings.
fn text_keyed_map(value: Value, field: &'static str) -> Result<Vec<(String, Value)>, Error> {
    let entries = match value {
        Value::Map(entries) => entries,
        other => {
            return Err(Error::InvalidType {
                field,
                expected: "map",
                received: cbor::kind(&other),
            })
        }
    };
    entries
        .into_iter()
        .map(|(k, v)| match k {
            Value::Text(k) => Ok((k, v)),
            other => Err(Error::InvalidType {
                field,
                expected: "tstr key",
                received: cbor::kind(&other),
            }),
        })
        .collect()
}

macro_rules! impl_as_cbor_value {
    ($t:ty) => {
        impl_as_cbor_value!($t, |value: $t| Ok(value.into()));
    };
    ($t:ty, fallible) => {
        impl_as_cbor_value!($t, Value::try_from);

        impl Serialize for $t {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                Value::try_from(self.clone())
                    .map_err(<S::Error as ser::Error>::custom)?
                    .serialize(serializer)
            }
        }
    };
    ($t:ty, $encode:expr) => {
        impl CborSerializable for $t {}
        impl AsCborValue for $t {
            fn from_cbor_value(value: Value) -> coset::Result<Self> {
                <$t>::try_from(value).map_err(|e| {
                    coset::CoseError::DecodeFailed(ciborium::de::Error::Semantic(
                        None,
                        e.to_string(),
                    ))
                })
            }

            fn to_cbor_value(self) -> coset::Result<Value> {
                ($encode)(self)
            }
        }
    };
}

impl_as_cbor_value!(DeviceRequest, fallible);
impl_as_cbor_value!(DocRequest, fallible);
impl_as_cbor_value!(ItemsRequest);
