//! Remi 服务客户端：用户身份、绑定，以及国服机台数据网关 (`/v1/maimaicn`)。

use super::backend::{ArcadeSource, IdentityBackend};
use super::bind::{Bind, BindType, DivingFishCredential, ProfileBindUpdate};
use super::error::{RemoteError, ensure_success};
use super::score::{ArcadeScore, PlayerPreview};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone)]
pub struct RemiClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct UuidResponse {
    uuid: Uuid,
}

#[derive(Serialize)]
struct CreateByQq<'a> {
    qq: &'a str,
}

#[derive(Serialize)]
struct DivingFishBindBody<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind_name: Option<&'a str>,
}

#[derive(Deserialize)]
struct UidResponse {
    #[serde(rename = "userID", alias = "userId", alias = "uid")]
    user_id: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MusicDetail {
    List(Vec<ArcadeScore>),
    Wrapped {
        #[serde(rename = "userMusicDetailList")]
        user_music_detail_list: Vec<ArcadeScore>,
    },
}

impl RemiClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    async fn get_binds(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Bind>, RemoteError> {
        let resp = self.client.get(self.url(path)).query(query).send().await?;
        let binds = ensure_success(resp, path)?.json::<Vec<Bind>>().await?;
        Ok(binds)
    }
}

#[async_trait]
impl IdentityBackend for RemiClient {
    async fn find_uuid(
        &self,
        bind_type: &BindType,
        content: &str,
    ) -> Result<Option<Uuid>, RemoteError> {
        let resp = self
            .client
            .get(self.url("/user/get-uuid"))
            .query(&[("bind_type", bind_type.as_str()), ("bind_content", content)])
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = ensure_success(resp, "get-uuid")?
            .json::<UuidResponse>()
            .await?;
        Ok(Some(body.uuid))
    }

    async fn create_by_qq(&self, qq: &str) -> Result<Uuid, RemoteError> {
        let resp = self
            .client
            .post(self.url("/user/create-by-qq"))
            .json(&CreateByQq { qq })
            .send()
            .await?;
        let body = ensure_success(resp, "create-by-qq")?
            .json::<UuidResponse>()
            .await?;
        Ok(body.uuid)
    }

    async fn add_bind(
        &self,
        uuid: Uuid,
        bind_type: &BindType,
        content: &str,
        name: Option<&str>,
    ) -> Result<Bind, RemoteError> {
        let mut query = vec![
            ("uuid", uuid.to_string()),
            ("bind_type", bind_type.to_string()),
            ("bind_content", content.to_string()),
        ];
        if let Some(name) = name {
            query.push(("bind_name", name.to_string()));
        }

        let resp = self
            .client
            .get(self.url("/user/add-bind"))
            .query(&query)
            .send()
            .await?;
        Ok(ensure_success(resp, "add-bind")?.json::<Bind>().await?)
    }

    async fn add_divingfish_bind(
        &self,
        uuid: Uuid,
        credential: &DivingFishCredential,
        name: Option<&str>,
    ) -> Result<Bind, RemoteError> {
        let resp = self
            .client
            .post(self.url("/user/add-divingfish-bind"))
            .query(&[("uuid", uuid.to_string())])
            .json(&DivingFishBindBody {
                username: &credential.username,
                password: &credential.password,
                bind_name: name,
            })
            .send()
            .await?;
        Ok(ensure_success(resp, "add-divingfish-bind")?
            .json::<Bind>()
            .await?)
    }

    async fn current_binds(&self, uuid: Uuid) -> Result<Vec<Bind>, RemoteError> {
        self.get_binds("/maimai/get-current-maimai-bind", &[("uuid", uuid.to_string())])
            .await
    }

    async fn update_current_binds(
        &self,
        uuid: Uuid,
        update: &ProfileBindUpdate,
    ) -> Result<Vec<Bind>, RemoteError> {
        let mut query = vec![("uuid", uuid.to_string())];
        if let Some(name) = &update.divingfish {
            query.push(("divingfish_bind_name", name.clone()));
        }
        if let Some(name) = &update.luoxue {
            query.push(("luoxue_bind_name", name.clone()));
        }
        self.get_binds("/maimai/update-current-maimai-bind", &query)
            .await
    }

    async fn switch_current_bind(
        &self,
        uuid: Uuid,
        bind_name: &str,
    ) -> Result<Vec<Bind>, RemoteError> {
        self.get_binds(
            "/maimai/switch-current-maimai-bind",
            &[("uuid", uuid.to_string()), ("bind_name", bind_name.to_string())],
        )
        .await
    }
}

#[async_trait]
impl ArcadeSource for RemiClient {
    async fn uid_from_qr(&self, qr_code: &str) -> Result<u64, RemoteError> {
        let resp = self
            .client
            .get(self.url("/maimaicn/get-uid"))
            .query(&[("qr_code", qr_code)])
            .send()
            .await?;
        let body = ensure_success(resp, "get-uid")?
            .json::<UidResponse>()
            .await?;
        Ok(body.user_id)
    }

    async fn scores(&self, uid: u64) -> Result<Vec<ArcadeScore>, RemoteError> {
        let resp = self
            .client
            .get(self.url("/maimaicn/user-music-detail"))
            .query(&[("uid", uid)])
            .send()
            .await?;
        let detail = ensure_success(resp, "user-music-detail")?
            .json::<MusicDetail>()
            .await?;
        Ok(match detail {
            MusicDetail::List(list) => list,
            MusicDetail::Wrapped {
                user_music_detail_list,
            } => user_music_detail_list,
        })
    }

    async fn preview(&self, uid: u64) -> Result<PlayerPreview, RemoteError> {
        let resp = self
            .client
            .get(self.url("/maimaicn/user-preview"))
            .query(&[("uid", uid)])
            .send()
            .await?;
        Ok(ensure_success(resp, "user-preview")?
            .json::<PlayerPreview>()
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockServer;

    const UUID: &str = "6f9619ff-8b86-d011-b42d-00c04fc964ff";

    fn uuid() -> Uuid {
        UUID.parse().unwrap()
    }

    #[tokio::test]
    async fn find_uuid_maps_404_to_none() {
        let server = MockServer::new().route(
            "GET",
            "/v1/user/get-uuid",
            200,
            &format!(r#"{{"uuid":"{}"}}"#, UUID),
        );
        let base = server.start().await;
        let remi = RemiClient::new(Client::new(), base);

        let found = remi.find_uuid(&BindType::Qq, "10001").await.unwrap();
        assert_eq!(found, Some(uuid()));
        let req = &server.requests()[0];
        assert_eq!(req.query("bind_type").as_deref(), Some("qq"));
        assert_eq!(req.query("bind_content").as_deref(), Some("10001"));

        let empty = MockServer::new();
        let remi = RemiClient::new(Client::new(), empty.start().await);
        assert_eq!(remi.find_uuid(&BindType::Qq, "1").await, Ok(None));
    }

    #[tokio::test]
    async fn create_conflict_is_classified() {
        let server = MockServer::new().route("POST", "/v1/user/create-by-qq", 409, "{}");
        let remi = RemiClient::new(Client::new(), server.start().await);

        assert_eq!(remi.create_by_qq("1").await, Err(RemoteError::Conflict));
        assert_eq!(server.requests()[0].json()["qq"], "1");
    }

    #[tokio::test]
    async fn update_omits_unset_bind_names() {
        let server = MockServer::new().route(
            "GET",
            "/v1/maimai/update-current-maimai-bind",
            200,
            r#"[{"bind_type":"maimai_cn","bind_content":"1","bind_name":"m","is_default":true}]"#,
        );
        let remi = RemiClient::new(Client::new(), server.start().await);

        let update = ProfileBindUpdate::for_provider(crate::maimai::ProviderKind::Lxns, "lx");
        let binds = remi.update_current_binds(uuid(), &update).await.unwrap();
        assert_eq!(binds.len(), 1);

        let req = &server.requests()[0];
        assert_eq!(req.query("luoxue_bind_name").as_deref(), Some("lx"));
        assert_eq!(req.query("divingfish_bind_name"), None);
    }

    #[tokio::test]
    async fn music_detail_accepts_both_shapes() {
        let row = r#"{"musicId":11451,"level":3,"achievement":1000000}"#;
        for body in [format!("[{}]", row), format!(r#"{{"userMusicDetailList":[{}]}}"#, row)] {
            let server =
                MockServer::new().route("GET", "/v1/maimaicn/user-music-detail", 200, &body);
            let remi = RemiClient::new(Client::new(), server.start().await);
            let scores = remi.scores(42).await.unwrap();
            assert_eq!(scores.len(), 1);
            assert_eq!(scores[0].music_id, 11451);
            assert_eq!(server.requests()[0].query("uid").as_deref(), Some("42"));
        }
    }

    #[tokio::test]
    async fn gateway_errors_are_transient() {
        let server = MockServer::new().route("GET", "/v1/maimaicn/user-preview", 502, "");
        let remi = RemiClient::new(Client::new(), server.start().await);
        assert!(matches!(remi.preview(1).await, Err(RemoteError::Transient(_))));
    }
}
