//! Router Configuration
//!
//! 엔드포인트 설명자와 라우터 설정
//!
//! 설정은 빌더로 직접 만들거나 YAML에서 읽을 수 있습니다. YAML 문자열은 파싱 전에
//! `${VAR}` / `${VAR:-default}` 환경 변수가 치환됩니다.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use super::error::{RouterError, RouterResult};
use super::pool::PoolConfig;
use super::transaction::NestingPolicy;

/// 포트가 생략된 경우의 기본 포트
pub const DEFAULT_PORT: u16 = 5432;

// ============================================================================
// Role - 엔드포인트 역할
// ============================================================================

/// 설정상의 엔드포인트 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 쓰기 가능한 프라이머리
    Primary,
    /// 읽기 전용 레플리카
    Replica,
}

impl Role {
    /// 역할을 문자열로 변환
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Replica => "replica",
        }
    }
}

// ============================================================================
// ServerAddress - 서버 주소
// ============================================================================

/// 서버 주소
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// 호스트
    pub host: String,
    /// 포트
    pub port: u16,
}

impl ServerAddress {
    /// 새 서버 주소 생성
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URL에서 주소와 데이터베이스 이름 파싱
    ///
    /// 형식: `[scheme://][user@]host[:port][/database][?params]`.
    /// `jdbc:postgresql://` 같은 중첩 스킴도 허용합니다.
    pub fn parse_url(url: &str) -> RouterResult<(Self, Option<String>)> {
        let rest = match url.rfind("://") {
            Some(idx) => &url[idx + 3..],
            None => url,
        };
        let rest = rest.split('?').next().unwrap_or(rest);

        let (authority, database) = match rest.split_once('/') {
            Some((authority, db)) if !db.is_empty() => (authority, Some(db.to_string())),
            Some((authority, _)) => (authority, None),
            None => (rest, None),
        };

        let host_port = match authority.rsplit_once('@') {
            Some((_, host_port)) => host_port,
            None => authority,
        };

        let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
            // IPv6: [::1]:5432
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| RouterError::configuration(format!("Invalid address in '{}'", url)))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port, url)?,
                None if tail.is_empty() => DEFAULT_PORT,
                None => return Err(RouterError::configuration(format!("Invalid address in '{}'", url))),
            };
            (host, port)
        } else {
            match host_port.split_once(':') {
                Some((host, port)) => (host, parse_port(port, url)?),
                None => (host_port, DEFAULT_PORT),
            }
        };

        if host.is_empty() {
            return Err(RouterError::configuration(format!("Missing host in '{}'", url)));
        }

        Ok((Self::new(host, port), database))
    }

    /// 소켓 주소로 변환
    pub fn to_socket_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn parse_port(port: &str, url: &str) -> RouterResult<u16> {
    port.parse()
        .map_err(|_| RouterError::configuration(format!("Invalid port in '{}'", url)))
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_socket_addr())
    }
}

// ============================================================================
// Credentials - 인증 정보
// ============================================================================

/// 엔드포인트 인증 정보
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// 사용자명
    pub username: Option<String>,
    /// 비밀번호
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

// ============================================================================
// EndpointConfig - 엔드포인트 설명자
// ============================================================================

/// 엔드포인트 설명자
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// 엔드포인트 이름 (로그와 메트릭용)
    pub name: String,
    /// 역할
    pub role: Role,
    /// 연결 URL
    pub url: String,
    /// 인증 정보 (`username`, `password` 키)
    #[serde(flatten, default)]
    pub credentials: Credentials,
    /// 풀 설정
    #[serde(default)]
    pub pool: PoolConfig,
}

impl EndpointConfig {
    /// 새 설명자 생성
    pub fn new(name: impl Into<String>, role: Role, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            url: url.into(),
            credentials: Credentials::default(),
            pool: PoolConfig::default(),
        }
    }

    /// 인증 정보 설정
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials {
            username: Some(username.into()),
            password: Some(password.into()),
        };
        self
    }

    /// 풀 설정
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

// ============================================================================
// RouterConfig - 라우터 설정
// ============================================================================

/// 라우터 설정
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouterConfig {
    /// 중첩 작업 단위 처리 방식
    #[serde(default)]
    pub nesting: NestingPolicy,
    /// 엔드포인트 목록
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl RouterConfig {
    /// 빌더 시작
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }

    /// YAML 문자열에서 읽기 (환경 변수 치환 후 검증)
    pub fn from_yaml_str(yaml: &str) -> RouterResult<Self> {
        let expanded = expand_env_vars(yaml);
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// YAML 파일에서 읽기
    pub fn from_file(path: impl AsRef<Path>) -> RouterResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// 토폴로지 검증
    ///
    /// 프라이머리 정확히 하나, 레플리카 하나 이상, 이름 중복 없음, URL과 풀 크기 유효.
    pub fn validate(&self) -> RouterResult<()> {
        let primaries = self.endpoints.iter().filter(|e| e.role == Role::Primary).count();
        match primaries {
            0 => return Err(RouterError::configuration("No primary endpoint configured")),
            1 => {}
            n => {
                return Err(RouterError::configuration(format!(
                    "Exactly one primary endpoint is allowed, found {}",
                    n
                )))
            }
        }

        if !self.endpoints.iter().any(|e| e.role == Role::Replica) {
            return Err(RouterError::configuration("At least one replica endpoint is required"));
        }

        let mut names = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.name.trim().is_empty() {
                return Err(RouterError::configuration("Endpoint name must not be empty"));
            }
            if !names.insert(endpoint.name.as_str()) {
                return Err(RouterError::configuration(format!(
                    "Duplicate endpoint name '{}'",
                    endpoint.name
                )));
            }

            ServerAddress::parse_url(&endpoint.url)?;

            if endpoint.pool.max_size == 0 {
                return Err(RouterError::configuration(format!(
                    "Endpoint '{}': pool max_size must be at least 1",
                    endpoint.name
                )));
            }
            if endpoint.pool.min_idle > endpoint.pool.max_size {
                return Err(RouterError::configuration(format!(
                    "Endpoint '{}': pool min_idle ({}) exceeds max_size ({})",
                    endpoint.name, endpoint.pool.min_idle, endpoint.pool.max_size
                )));
            }
        }

        Ok(())
    }

    /// 프라이머리 설명자
    pub fn primary(&self) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.role == Role::Primary)
    }

    /// 레플리카 설명자 (설정 순서)
    pub fn replicas(&self) -> impl Iterator<Item = &EndpointConfig> {
        self.endpoints.iter().filter(|e| e.role == Role::Replica)
    }
}

// ============================================================================
// RouterConfigBuilder - 설정 빌더
// ============================================================================

/// 라우터 설정 빌더
#[derive(Debug, Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// 프라이머리 추가
    pub fn with_primary(self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.with_endpoint(EndpointConfig::new(name, Role::Primary, url))
    }

    /// 레플리카 추가
    pub fn with_replica(self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.with_endpoint(EndpointConfig::new(name, Role::Replica, url))
    }

    /// 설명자 추가
    pub fn with_endpoint(mut self, endpoint: EndpointConfig) -> Self {
        self.config.endpoints.push(endpoint);
        self
    }

    /// 모든 엔드포인트에 같은 풀 설정 적용
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        for endpoint in &mut self.config.endpoints {
            endpoint.pool = pool.clone();
        }
        self
    }

    /// 중첩 처리 방식 설정
    pub fn with_nesting(mut self, nesting: NestingPolicy) -> Self {
        self.config.nesting = nesting;
        self
    }

    /// 검증 후 빌드
    pub fn build(self) -> RouterResult<RouterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `${VAR}` / `${VAR:-default}` 환경 변수 치환
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<Regex> = OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var pattern is a valid regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================
