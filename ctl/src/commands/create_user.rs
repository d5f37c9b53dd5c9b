use clap::Parser;
use gcipher_db::{models::DbUser, storage::UserStore};

#[derive(Clone, Parser)]
pub struct CreateUserParams {
    #[clap(short, long)]
    pub username: String,

    #[clap(short, long)]
    pub password: String,

    /// bcrypt work factor.
    #[clap(long, default_value_t = bcrypt::DEFAULT_COST)]
    pub cost: u32,
}

pub async fn create_user(
    stg: &impl UserStore,
    CreateUserParams {
        username,
        password,
        cost,
    }: CreateUserParams,
) -> anyhow::Result<()> {
    let user = DbUser::with_password(username, &password, cost)?;

    let created = UserStore::create(stg, user).await?;
    println!("Created user {}", created.username);

    Ok(())
}
