//! OceanStor Device-Manager REST Client
//!
//! [`ArraySession`] over the array's JSON REST API. Every response carries an
//! envelope `{"data": ..., "error": {"code": ..., "description": ...}}`; a
//! non-zero code is turned into a typed [`Error`]. The session token is
//! renewed once when the array reports the session as expired.

use super::config::AuthOptions;
use super::session::{
    ArrayPool, ArraySession, ArraySnapshot, CreateLunParams, FcInitiator, FcTargets,
    IscsiInitiator, Lun,
};
use crate::domain::model::{HostInfo, ProvisioningPolicy};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use urlencoding::encode;

// =============================================================================
// Error Codes
// =============================================================================

const ERROR_SUCCESS: i64 = 0;
const ERROR_UNAUTHORIZED: i64 = -401;
const ERROR_CONNECT_TO_SERVER: i64 = -403;
const ERROR_OBJECT_ID_NOT_UNIQUE: i64 = 1077948997;

/// Codes meaning the addressed object does not exist
const NOT_FOUND_CODES: &[i64] = &[
    1077948996, // object does not exist
    1077936859, // LUN does not exist
    1077937500, // host group does not exist
    1077937880, // snapshot does not exist
    1077951819, // mapping view does not exist
    1077950183, // LUN copy does not exist
    1077948998, // initiator does not exist
];

// Object type ids used by association calls
const TYPE_LUN: i64 = 11;
const TYPE_HOST_GROUP: i64 = 14;
const TYPE_HOST: i64 = 21;
const TYPE_SNAPSHOT: i64 = 27;
const TYPE_LUN_COPY: i64 = 219;
const TYPE_ISCSI_INITIATOR: i64 = 222;
const TYPE_FC_INITIATOR: i64 = 223;
const TYPE_MAPPING_VIEW: i64 = 245;
const TYPE_LUN_GROUP: i64 = 256;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    deviceid: String,
    #[serde(rename = "iBaseToken")]
    ibase_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
struct RawLun {
    id: String,
    name: String,
    description: String,
    capacity: String,
    wwn: String,
    healthstatus: String,
    runningstatus: String,
    parentid: String,
    parentname: String,
}

impl TryFrom<RawLun> for Lun {
    type Error = Error;

    fn try_from(raw: RawLun) -> Result<Self> {
        Ok(Lun {
            capacity: parse_number(&raw.capacity, "CAPACITY")?,
            id: raw.id,
            name: raw.name,
            description: raw.description,
            wwn: raw.wwn,
            health_status: raw.healthstatus,
            running_status: raw.runningstatus,
            parent_id: raw.parentid,
            parent_name: raw.parentname,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
struct RawPool {
    id: String,
    name: String,
    usertotalcapacity: String,
    userfreecapacity: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
struct RawSnapshot {
    id: String,
    name: String,
    description: String,
    parentid: String,
}

impl From<RawSnapshot> for ArraySnapshot {
    fn from(raw: RawSnapshot) -> Self {
        ArraySnapshot {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            parent_id: raw.parentid,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
struct RawInitiator {
    id: String,
    isfree: String,
    parentid: String,
    runningstatus: String,
}

impl RawInitiator {
    fn parent(&self) -> Option<String> {
        if self.isfree == "true" || self.parentid.is_empty() {
            None
        } else {
            Some(self.parentid.clone())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE", default)]
struct RawObject {
    id: String,
    name: String,
    associatemetadata: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHostLink {
    #[serde(rename = "TARGET_PORT_WWN")]
    target_port_wwn: String,
}

#[derive(Debug, Deserialize)]
struct HostLunMetadata {
    #[serde(rename = "HostLUNID")]
    host_lun_id: i64,
}

fn parse_number(raw: &str, field: &str) -> Result<i64> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| Error::Backend {
        code: -1,
        description: format!("unexpected {} value: {}", field, raw),
    })
}

/// Map array-side "does not exist" codes to [`Error::ObjectNotFound`]
fn classify(err: Error, kind: &str, name: &str) -> Error {
    match err {
        Error::Backend { code, .. } if NOT_FOUND_CODES.contains(&code) => Error::not_found(kind, name),
        other => other,
    }
}

fn unwrap_envelope(envelope: Envelope) -> Result<Value> {
    if envelope.error.code != ERROR_SUCCESS {
        return Err(Error::Backend {
            code: envelope.error.code,
            description: envelope.error.description,
        });
    }
    Ok(envelope.data.unwrap_or(Value::Null))
}

// =============================================================================
// REST Client
// =============================================================================

#[derive(Debug, Clone)]
struct Session {
    /// `{endpoint}/{deviceid}`
    base_url: String,
    token: String,
}

/// REST session with one OceanStor array
pub struct RestClient {
    client: Client,
    endpoints: Vec<String>,
    username: String,
    password: String,
    session: RwLock<Option<Session>>,
}

impl RestClient {
    /// Create a client; call [`ArraySession::login`] before use
    pub fn new(auth: &AuthOptions) -> Result<Self> {
        let endpoints = auth.endpoint_list();
        if endpoints.is_empty() {
            return Err(Error::Configuration("no device-manager endpoint configured".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(auth.insecure)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            username: auth.username.clone(),
            password: auth.password.clone(),
            session: RwLock::new(None),
        })
    }

    fn current_session(&self) -> Result<Session> {
        self.session.read().clone().ok_or_else(|| Error::BackendUnavailable {
            backend: "oceanstor: not logged in".into(),
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let session = self.current_session()?;
        let url = format!("{}{}", session.base_url, path);
        debug!("OceanStor request: {} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("iBaseToken", &session.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let envelope: Envelope = request.send().await?.json().await?;
        unwrap_envelope(envelope)
    }

    /// Issue a call, logging in again once if the session expired
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        match self.send(method.clone(), path, body.as_ref()).await {
            Err(Error::Backend { code, .. })
                if code == ERROR_UNAUTHORIZED || code == ERROR_CONNECT_TO_SERVER =>
            {
                warn!("OceanStor session expired, logging in again");
                self.login().await?;
                self.send(method, path, body.as_ref()).await
            }
            other => other,
        }
    }

    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        match self.call(Method::GET, path, None).await? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|v| serde_json::from_value(v).map_err(Error::from))
                .collect(),
            single => Ok(vec![serde_json::from_value(single)?]),
        }
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, kind: &str, name: &str) -> Result<T> {
        let data = self
            .call(Method::GET, path, None)
            .await
            .map_err(|e| classify(e, kind, name))?;
        let item = match data {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) | Value::Null => return Err(Error::not_found(kind, name)),
            single => single,
        };
        Ok(serde_json::from_value(item)?)
    }

    async fn find_id_by_name(&self, resource: &str, kind: &str, name: &str) -> Result<String> {
        let path = format!("/{}?filter=NAME::{}&range=[0-100]", resource, encode(name));
        let objects: Vec<RawObject> = self.get_list(&path).await?;
        objects
            .into_iter()
            .find(|o| o.name == name)
            .map(|o| o.id)
            .ok_or_else(|| Error::not_found(kind, name))
    }

    async fn create_object(&self, path: &str, body: Value) -> Result<String> {
        let raw: RawObject = serde_json::from_value(self.call(Method::POST, path, Some(body)).await?)?;
        Ok(raw.id)
    }

    async fn delete(&self, path: &str, kind: &str, id: &str) -> Result<()> {
        self.call(Method::DELETE, path, None)
            .await
            .map(|_| ())
            .map_err(|e| classify(e, kind, id))
    }

    async fn associated_ids(&self, path: &str) -> Result<Vec<String>> {
        let objects: Vec<RawObject> = self.get_list(path).await?;
        Ok(objects.into_iter().map(|o| o.id).collect())
    }

    async fn views_of(&self, object_type: i64, object_id: &str) -> Result<Vec<String>> {
        self.associated_ids(&format!(
            "/mappingview/associate?TYPE={}&ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            TYPE_MAPPING_VIEW, object_type, object_id
        ))
        .await
    }
}

#[async_trait]
impl ArraySession for RestClient {
    async fn login(&self) -> Result<()> {
        let body = json!({
            "username": self.username,
            "password": self.password,
            "scope": "0",
        });

        let mut last_error = None;
        for endpoint in &self.endpoints {
            let url = format!("{}/xx/sessions", endpoint);
            let outcome = async {
                let envelope: Envelope = self.client.post(&url).json(&body).send().await?.json().await?;
                let data: LoginData = serde_json::from_value(unwrap_envelope(envelope)?)?;
                Ok::<_, Error>(data)
            }
            .await;

            match outcome {
                Ok(data) => {
                    info!("Logged in to OceanStor at {}", endpoint);
                    *self.session.write() = Some(Session {
                        base_url: format!("{}/{}", endpoint, data.deviceid),
                        token: data.ibase_token,
                    });
                    return Ok(());
                }
                Err(e) => {
                    warn!("Login to {} failed: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::BackendUnavailable {
            backend: "oceanstor".into(),
        }))
    }

    async fn logout(&self) -> Result<()> {
        if self.session.read().is_none() {
            return Ok(());
        }
        let result = self.send(Method::DELETE, "/sessions", None).await;
        *self.session.write() = None;
        result.map(|_| ())
    }

    // --- LUNs ---------------------------------------------------------------

    async fn create_lun(&self, params: &CreateLunParams) -> Result<Lun> {
        let alloc_type = match params.policy {
            ProvisioningPolicy::Thick => 0,
            ProvisioningPolicy::Thin => 1,
        };
        let mut body = json!({
            "NAME": params.name,
            "PARENTID": params.pool_id,
            "DESCRIPTION": params.description,
            "ALLOCTYPE": alloc_type,
            "CAPACITY": params.capacity,
            "WRITEPOLICY": 1,
            "MIRRORPOLICY": 1,
            "PREFETCHPOLICY": 3,
            "PREFETCHVALUE": 0,
            "DATATRANSFERPOLICY": 1,
        });
        if let Some(id) = params.id {
            body["ID"] = json!(id.to_string());
        }

        let data = match (self.call(Method::POST, "/lun", Some(body)).await, params.id) {
            (Err(Error::Backend { code, .. }), Some(id)) if code == ERROR_OBJECT_ID_NOT_UNIQUE => {
                return Err(Error::IdInUse { id })
            }
            (result, _) => result?,
        };
        let raw: RawLun = serde_json::from_value(data)?;
        raw.try_into()
    }

    async fn get_lun(&self, id: &str) -> Result<Lun> {
        let raw: RawLun = self.get_one(&format!("/lun/{}", id), "lun", id).await?;
        raw.try_into()
    }

    async fn get_lun_by_name(&self, name: &str) -> Result<Lun> {
        let path = format!("/lun?filter=NAME::{}&range=[0-100]", encode(name));
        let luns: Vec<RawLun> = self.get_list(&path).await?;
        luns.into_iter()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::not_found("lun", name))?
            .try_into()
    }

    async fn delete_lun(&self, id: &str) -> Result<()> {
        self.delete(&format!("/lun/{}", id), "lun", id).await
    }

    async fn extend_lun(&self, id: &str, capacity: i64) -> Result<()> {
        let body = json!({ "TYPE": TYPE_LUN, "ID": id, "CAPACITY": capacity });
        self.call(Method::PUT, "/lun/expand", Some(body))
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "lun", id))
    }

    async fn list_lun_ids(&self, start: i64, end: i64) -> Result<Vec<i64>> {
        let path = format!("/lun?range=[{}-{}]&sortby=ID,a", start, end);
        let luns: Vec<RawLun> = self.get_list(&path).await?;
        luns.iter().map(|l| parse_number(&l.id, "ID")).collect()
    }

    // --- Pools --------------------------------------------------------------

    async fn list_storage_pools(&self) -> Result<Vec<ArrayPool>> {
        let pools: Vec<RawPool> = self.get_list("/storagepool?range=[0-100]").await?;
        pools
            .into_iter()
            .map(|p| {
                Ok(ArrayPool {
                    user_total_capacity: parse_number(&p.usertotalcapacity, "USERTOTALCAPACITY")?,
                    user_free_capacity: parse_number(&p.userfreecapacity, "USERFREECAPACITY")?,
                    id: p.id,
                    name: p.name,
                })
            })
            .collect()
    }

    // --- Snapshots ----------------------------------------------------------

    async fn create_snapshot(
        &self,
        lun_id: &str,
        name: &str,
        description: &str,
    ) -> Result<ArraySnapshot> {
        let body = json!({
            "TYPE": TYPE_SNAPSHOT,
            "NAME": name,
            "DESCRIPTION": description,
            "PARENTTYPE": TYPE_LUN,
            "PARENTID": lun_id,
        });
        let data = self
            .call(Method::POST, "/snapshot", Some(body))
            .await
            .map_err(|e| classify(e, "lun", lun_id))?;
        let snapshot: ArraySnapshot = serde_json::from_value::<RawSnapshot>(data)?.into();

        let activate = json!({ "SNAPSHOTLIST": [snapshot.id] });
        self.call(Method::POST, "/snapshot/activate", Some(activate)).await?;
        Ok(snapshot)
    }

    async fn get_snapshot_by_name(&self, name: &str) -> Result<ArraySnapshot> {
        let path = format!("/snapshot?filter=NAME::{}&range=[0-100]", encode(name));
        let snapshots: Vec<RawSnapshot> = self.get_list(&path).await?;
        snapshots
            .into_iter()
            .find(|s| s.name == name)
            .map(ArraySnapshot::from)
            .ok_or_else(|| Error::not_found("snapshot", name))
    }

    async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let stop = json!({ "ID": id });
        if let Err(e) = self.call(Method::PUT, "/snapshot/stop", Some(stop)).await {
            debug!("Stop snapshot {} before delete: {}", id, e);
        }
        self.delete(&format!("/snapshot/{}", id), "snapshot", id).await
    }

    // --- LUN copy -----------------------------------------------------------

    async fn create_lun_copy(
        &self,
        name: &str,
        source_id: &str,
        target_id: &str,
        speed: i32,
    ) -> Result<String> {
        let body = json!({
            "TYPE": TYPE_LUN_COPY,
            "NAME": name,
            "COPYSPEED": speed,
            "LUNCOPYTYPE": "1",
            "SOURCELUN": format!("INVALID;{};INVALID;INVALID;INVALID", source_id),
            "TARGETLUN": format!("INVALID;{};INVALID;INVALID;INVALID", target_id),
        });
        self.create_object("/luncopy", body).await
    }

    async fn start_lun_copy(&self, id: &str) -> Result<()> {
        let body = json!({ "TYPE": TYPE_LUN_COPY, "ID": id });
        self.call(Method::PUT, "/LUNCOPY/start", Some(body))
            .await
            .map(|_| ())
    }

    async fn delete_lun_copy(&self, id: &str) -> Result<()> {
        self.delete(&format!("/LUNCOPY/{}", id), "lun copy", id).await
    }

    // --- Hosts --------------------------------------------------------------

    async fn get_host_id_by_name(&self, name: &str) -> Result<String> {
        self.find_id_by_name("host", "host", name).await
    }

    async fn add_host(&self, name: &str, host: &HostInfo) -> Result<String> {
        let body = json!({
            "TYPE": TYPE_HOST,
            "NAME": name,
            "OPERATIONSYSTEM": "0",
            "DESCRIPTION": host.host,
            "IP": host.ip,
        });
        self.create_object("/host", body).await
    }

    async fn delete_host(&self, host_id: &str) -> Result<()> {
        self.delete(&format!("/host/{}", host_id), "host", host_id).await
    }

    // --- Initiators ---------------------------------------------------------

    async fn get_iscsi_initiator(&self, iqn: &str) -> Result<IscsiInitiator> {
        let raw: RawInitiator = self
            .get_one(&format!("/iscsi_initiator/{}", encode(iqn)), "iscsi initiator", iqn)
            .await?;
        Ok(IscsiInitiator {
            parent_id: raw.parent(),
            iqn: raw.id,
        })
    }

    async fn add_iscsi_initiator(&self, iqn: &str) -> Result<()> {
        let body = json!({ "ID": iqn, "TYPE": TYPE_ISCSI_INITIATOR, "USECHAP": "false" });
        self.call(Method::POST, "/iscsi_initiator", Some(body))
            .await
            .map(|_| ())
    }

    async fn add_iscsi_initiator_to_host(&self, iqn: &str, host_id: &str) -> Result<()> {
        let body = json!({
            "TYPE": TYPE_ISCSI_INITIATOR,
            "ID": iqn,
            "USECHAP": "false",
            "PARENTTYPE": TYPE_HOST,
            "PARENTID": host_id,
        });
        self.call(Method::PUT, &format!("/iscsi_initiator/{}", encode(iqn)), Some(body))
            .await
            .map(|_| ())
    }

    async fn remove_iscsi_from_host(&self, iqn: &str) -> Result<()> {
        let body = json!({ "TYPE": TYPE_ISCSI_INITIATOR, "ID": iqn });
        self.call(Method::PUT, "/iscsi_initiator/remove_iscsi_from_host", Some(body))
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "iscsi initiator", iqn))
    }

    async fn host_iscsi_initiators(&self, host_id: &str) -> Result<Vec<String>> {
        self.associated_ids(&format!("/iscsi_initiator?PARENTID={}", host_id))
            .await
    }

    async fn get_fc_initiator(&self, wwn: &str) -> Result<FcInitiator> {
        let raw: RawInitiator = self
            .get_one(&format!("/fc_initiator/{}", wwn), "fc initiator", wwn)
            .await?;
        Ok(FcInitiator {
            parent_id: raw.parent(),
            running_status: raw.runningstatus,
            wwn: raw.id,
        })
    }

    async fn add_fc_port_to_host(&self, wwn: &str, host_id: &str) -> Result<()> {
        let body = json!({
            "TYPE": TYPE_FC_INITIATOR,
            "ID": wwn,
            "PARENTTYPE": TYPE_HOST,
            "PARENTID": host_id,
        });
        self.call(Method::PUT, &format!("/fc_initiator/{}", wwn), Some(body))
            .await
            .map(|_| ())
    }

    async fn remove_fc_from_host(&self, wwn: &str) -> Result<()> {
        let body = json!({ "TYPE": TYPE_FC_INITIATOR, "ID": wwn });
        self.call(Method::PUT, "/fc_initiator/remove_fc_from_host", Some(body))
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "fc initiator", wwn))
    }

    async fn host_fc_initiators(&self, host_id: &str) -> Result<Vec<String>> {
        self.associated_ids(&format!("/fc_initiator?PARENTID={}", host_id))
            .await
    }

    async fn get_ini_targ_map(&self, wwns: &[String]) -> Result<FcTargets> {
        let mut targets = FcTargets::default();
        for wwn in wwns {
            let path = format!(
                "/host_link?INITIATOR_TYPE={}&INITIATOR_PORT_WWN={}",
                TYPE_FC_INITIATOR, wwn
            );
            let links: Vec<RawHostLink> = self.get_list(&path).await?;
            let ports: Vec<String> = links.into_iter().map(|l| l.target_port_wwn).collect();
            for port in &ports {
                if !targets.target_wwns.contains(port) {
                    targets.target_wwns.push(port.clone());
                }
            }
            targets.initiator_target_map.insert(wwn.clone(), ports);
        }
        Ok(targets)
    }

    // --- Host groups --------------------------------------------------------

    async fn find_host_group(&self, name: &str) -> Result<String> {
        self.find_id_by_name("hostgroup", "host group", name).await
    }

    async fn create_host_group(&self, name: &str) -> Result<String> {
        let body = json!({ "TYPE": TYPE_HOST_GROUP, "NAME": name });
        self.create_object("/hostgroup", body).await
    }

    async fn host_group_hosts(&self, group_id: &str) -> Result<Vec<String>> {
        self.associated_ids(&format!(
            "/host/associate?ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            TYPE_HOST_GROUP, group_id
        ))
        .await
    }

    async fn add_host_to_host_group(&self, group_id: &str, host_id: &str) -> Result<()> {
        let body = json!({
            "TYPE": TYPE_HOST_GROUP,
            "ID": group_id,
            "ASSOCIATEOBJTYPE": TYPE_HOST,
            "ASSOCIATEOBJID": host_id,
        });
        self.call(Method::POST, "/hostgroup/associate", Some(body))
            .await
            .map(|_| ())
    }

    async fn remove_host_from_host_group(&self, group_id: &str, host_id: &str) -> Result<()> {
        let path = format!(
            "/host/associate?TYPE={}&ID={}&ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            TYPE_HOST_GROUP, group_id, TYPE_HOST, host_id
        );
        self.delete(&path, "host group", group_id).await
    }

    async fn delete_host_group(&self, group_id: &str) -> Result<()> {
        self.delete(&format!("/hostgroup/{}", group_id), "host group", group_id)
            .await
    }

    // --- LUN groups ---------------------------------------------------------

    async fn find_lun_group(&self, name: &str) -> Result<String> {
        self.find_id_by_name("lungroup", "lun group", name).await
    }

    async fn create_lun_group(&self, name: &str) -> Result<String> {
        let body = json!({
            "NAME": name,
            "DESCRIPTION": name,
            "APPTYPE": "0",
            "GROUPTYPE": "0",
        });
        self.create_object("/lungroup", body).await
    }

    async fn lun_group_luns(&self, group_id: &str) -> Result<Vec<String>> {
        self.associated_ids(&format!(
            "/lun/associate?TYPE={}&ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            TYPE_LUN, TYPE_LUN_GROUP, group_id
        ))
        .await
    }

    async fn add_lun_to_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()> {
        let body = json!({
            "ID": group_id,
            "ASSOCIATEOBJTYPE": TYPE_LUN,
            "ASSOCIATEOBJID": lun_id,
        });
        self.call(Method::POST, "/lungroup/associate", Some(body))
            .await
            .map(|_| ())
    }

    async fn remove_lun_from_lun_group(&self, group_id: &str, lun_id: &str) -> Result<()> {
        let path = format!(
            "/lungroup/associate?ID={}&ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            group_id, TYPE_LUN, lun_id
        );
        self.delete(&path, "lun group", group_id).await
    }

    async fn delete_lun_group(&self, group_id: &str) -> Result<()> {
        self.delete(&format!("/lungroup/{}", group_id), "lun group", group_id)
            .await
    }

    // --- Mapping views ------------------------------------------------------

    async fn find_mapping_view(&self, name: &str) -> Result<String> {
        self.find_id_by_name("mappingview", "mapping view", name).await
    }

    async fn create_mapping_view(&self, name: &str) -> Result<String> {
        let body = json!({ "NAME": name, "TYPE": TYPE_MAPPING_VIEW });
        self.create_object("/mappingview", body).await
    }

    async fn mapping_view_has_host_group(&self, view_id: &str, group_id: &str) -> Result<bool> {
        Ok(self
            .views_of(TYPE_HOST_GROUP, group_id)
            .await?
            .iter()
            .any(|v| v == view_id))
    }

    async fn mapping_view_has_lun_group(&self, view_id: &str, group_id: &str) -> Result<bool> {
        Ok(self
            .views_of(TYPE_LUN_GROUP, group_id)
            .await?
            .iter()
            .any(|v| v == view_id))
    }

    async fn associate_host_group(&self, view_id: &str, group_id: &str) -> Result<()> {
        let body = json!({
            "ASSOCIATEOBJTYPE": TYPE_HOST_GROUP,
            "ASSOCIATEOBJID": group_id,
            "TYPE": TYPE_MAPPING_VIEW,
            "ID": view_id,
        });
        self.call(Method::PUT, "/mappingview/create_associate", Some(body))
            .await
            .map(|_| ())
    }

    async fn associate_lun_group(&self, view_id: &str, group_id: &str) -> Result<()> {
        let body = json!({
            "ASSOCIATEOBJTYPE": TYPE_LUN_GROUP,
            "ASSOCIATEOBJID": group_id,
            "TYPE": TYPE_MAPPING_VIEW,
            "ID": view_id,
        });
        self.call(Method::PUT, "/mappingview/create_associate", Some(body))
            .await
            .map(|_| ())
    }

    async fn remove_host_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()> {
        let body = json!({
            "ASSOCIATEOBJTYPE": TYPE_HOST_GROUP,
            "ASSOCIATEOBJID": group_id,
            "TYPE": TYPE_MAPPING_VIEW,
            "ID": view_id,
        });
        self.call(Method::PUT, "/mappingview/remove_associate", Some(body))
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "mapping view", view_id))
    }

    async fn remove_lun_group_from_view(&self, view_id: &str, group_id: &str) -> Result<()> {
        let body = json!({
            "ASSOCIATEOBJTYPE": TYPE_LUN_GROUP,
            "ASSOCIATEOBJID": group_id,
            "TYPE": TYPE_MAPPING_VIEW,
            "ID": view_id,
        });
        self.call(Method::PUT, "/mappingview/remove_associate", Some(body))
            .await
            .map(|_| ())
            .map_err(|e| classify(e, "mapping view", view_id))
    }

    async fn delete_mapping_view(&self, view_id: &str) -> Result<()> {
        self.delete(&format!("/mappingview/{}", view_id), "mapping view", view_id)
            .await
    }

    // --- Mapping results ----------------------------------------------------

    async fn get_host_lun_id(&self, host_id: &str, lun_id: &str) -> Result<i64> {
        let path = format!(
            "/lun/associate?TYPE={}&ASSOCIATEOBJTYPE={}&ASSOCIATEOBJID={}",
            TYPE_LUN, TYPE_HOST, host_id
        );
        let mapped: Vec<RawObject> = self.get_list(&path).await?;
        let entry = mapped
            .into_iter()
            .find(|o| o.id == lun_id)
            .ok_or_else(|| Error::not_found("host lun", lun_id))?;
        let metadata: HostLunMetadata = serde_json::from_str(&entry.associatemetadata)?;
        Ok(metadata.host_lun_id)
    }

    async fn list_iscsi_target_ports(&self) -> Result<Vec<String>> {
        self.associated_ids("/iscsi_tgt_port").await
    }
}
