#![allow(dead_code)]

use async_trait::async_trait;
use restblog::{
    AppConfig, AppState,
    auth::{AuthUser, Claims},
    config::LOCAL_JWT_SECRET,
    models::{Post, PostRequest, Role, User},
    password,
    repository::Repository,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

// --- In-memory Repository ---

#[derive(Debug, Clone)]
struct StoredPost {
    id: i64,
    title: String,
    content: String,
    user_id: i64,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    posts: Vec<StoredPost>,
    next_user_id: i64,
    next_post_id: i64,
}

/// Repository double that behaves like the Postgres implementation for the
/// contract the handlers rely on, or fails every call when built with `failing()`.
#[derive(Default)]
pub struct MemoryRepo {
    store: Mutex<Store>,
    failing: bool,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Inserts a user directly, hashing `plain_password` when given.
    pub fn seed_user(&self, email: &str, role: Role, plain_password: Option<&str>) -> User {
        let mut store = self.store.lock().unwrap();
        store.next_user_id += 1;
        let user = User {
            id: store.next_user_id,
            email: email.to_string(),
            username: Some(email.split('@').next().unwrap_or_default().to_string()),
            password: plain_password.map(|p| password::hash_password(p).unwrap()),
            role,
        };
        store.users.push(user.clone());
        user
    }

    pub fn seed_post(&self, owner_id: i64, title: &str, content: &str) {
        let mut store = self.store.lock().unwrap();
        store.next_post_id += 1;
        let id = store.next_post_id;
        store.posts.push(StoredPost {
            id,
            title: title.to_string(),
            content: content.to_string(),
            user_id: owner_id,
        });
    }

    pub fn stored_user(&self, id: i64) -> Option<User> {
        let store = self.store.lock().unwrap();
        store.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn posts_owned_by(&self, user_id: i64) -> usize {
        let store = self.store.lock().unwrap();
        store.posts.iter().filter(|p| p.user_id == user_id).count()
    }

    pub fn post_count(&self) -> usize {
        self.store.lock().unwrap().posts.len()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.failing {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }

    fn filter_users(&self, keep: impl Fn(&User) -> bool) -> Result<Vec<User>, sqlx::Error> {
        self.check()?;
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().filter(|u| keep(u)).cloned().collect())
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    async fn find_all_users(&self) -> Result<Vec<User>, sqlx::Error> {
        self.filter_users(|_| true)
    }

    async fn find_all_users_by_email(&self, email: &str) -> Result<Vec<User>, sqlx::Error> {
        self.filter_users(|u| u.email == email)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        Ok(self.filter_users(|u| u.email == email)?.into_iter().next())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        Ok(self.filter_users(|u| u.id == id)?.into_iter().next())
    }

    async fn find_users_by_email_contains(&self, fragment: &str) -> Result<Vec<User>, sqlx::Error> {
        self.filter_users(|u| u.email.contains(fragment))
    }

    async fn find_users_by_email_contains_and_email(
        &self,
        fragment: &str,
        email: &str,
    ) -> Result<Vec<User>, sqlx::Error> {
        self.filter_users(|u| u.email.contains(fragment) && u.email == email)
    }

    async fn exists_user_by_id(&self, id: i64) -> Result<bool, sqlx::Error> {
        Ok(!self.filter_users(|u| u.id == id)?.is_empty())
    }

    async fn exists_user_by_email(&self, email: &str) -> Result<bool, sqlx::Error> {
        Ok(!self.filter_users(|u| u.email == email)?.is_empty())
    }

    async fn insert_user(&self, user: User) -> Result<User, sqlx::Error> {
        self.check()?;
        let mut store = self.store.lock().unwrap();
        store.next_user_id += 1;
        let stored = User {
            id: store.next_user_id,
            ..user
        };
        store.users.push(stored.clone());
        Ok(stored)
    }

    async fn update_user(&self, user: User) -> Result<Option<User>, sqlx::Error> {
        self.check()?;
        let mut store = self.store.lock().unwrap();
        match store.users.iter_mut().find(|u| u.id == user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut store = self.store.lock().unwrap();
        match store.users.iter_mut().find(|u| u.id == id) {
            Some(slot) => {
                slot.password = Some(password_hash.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: i64) -> Result<bool, sqlx::Error> {
        self.check()?;
        let mut store = self.store.lock().unwrap();
        if !store.users.iter().any(|u| u.id == id) {
            return Ok(false);
        }
        store.posts.retain(|p| p.user_id != id);
        store.users.retain(|u| u.id != id);
        Ok(true)
    }

    async fn find_all_posts(&self) -> Result<Vec<Post>, sqlx::Error> {
        self.check()?;
        let store = self.store.lock().unwrap();
        Ok(store
            .posts
            .iter()
            .filter_map(|p| {
                let owner = store.users.iter().find(|u| u.id == p.user_id)?;
                Some(Post {
                    id: p.id,
                    title: p.title.clone(),
                    content: p.content.clone(),
                    user: owner.clone(),
                })
            })
            .collect())
    }

    async fn insert_post(&self, post: PostRequest) -> Result<Post, sqlx::Error> {
        self.check()?;
        let mut store = self.store.lock().unwrap();
        let owner = store
            .users
            .iter()
            .find(|u| u.id == post.user.id)
            .cloned()
            .ok_or(sqlx::Error::RowNotFound)?;
        store.next_post_id += 1;
        let id = store.next_post_id;
        store.posts.push(StoredPost {
            id,
            title: post.title.clone(),
            content: post.content.clone(),
            user_id: owner.id,
        });
        Ok(Post {
            id,
            title: post.title,
            content: post.content,
            user: owner,
        })
    }
}

// --- State & Principal Helpers ---

pub const AUDIENCE: &str = "api";

pub fn app_state(repo: Arc<MemoryRepo>) -> AppState {
    app_state_with(repo, AppConfig::default())
}

pub fn app_state_with(repo: Arc<MemoryRepo>, config: AppConfig) -> AppState {
    AppState { repo, config }
}

pub fn principal(user: &User) -> AuthUser {
    AuthUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    }
}

/// Bearer token signed with the default test secret, valid for an hour.
pub fn token_for(email: &str) -> String {
    Claims::issue(email, AUDIENCE, LOCAL_JWT_SECRET, Duration::from_secs(3600)).unwrap()
}

pub fn bearer(email: &str) -> String {
    format!("Bearer {}", token_for(email))
}
