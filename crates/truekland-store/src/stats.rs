use crate::database::Database;
use crate::error::Result;
use crate::models::MarketplaceStats;

impl Database {
    pub fn marketplace_stats(&self) -> Result<MarketplaceStats> {
        let (posts, unauthorized_posts) = self.count_posts()?;
        Ok(MarketplaceStats {
            users: self.count_users()?,
            posts,
            unauthorized_posts,
            chats: self.count_chats()?,
            exchanges_by_status: self.count_exchanges_by_status()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft, seed_user};
    use truekland_shared::Category;

    #[test]
    fn stats_on_small_marketplace() {
        let db = Database::open_in_memory().unwrap();
        let ana = seed_user(&db, "ana");
        let ben = seed_user(&db, "ben");
        db.create_post(ana, &draft("Bike", Category::Sports), true).unwrap();
        db.create_post(ben, &draft("Lamp", Category::Home), false).unwrap();
        db.get_or_create_chat(ana, ben, None).unwrap();

        let stats = db.marketplace_stats().unwrap();
        assert_eq!(stats.users, 2);
        assert_eq!(stats.posts, 2);
        assert_eq!(stats.unauthorized_posts, 1);
        assert_eq!(stats.chats, 1);
        assert!(stats.exchanges_by_status.is_empty());
    }
}
