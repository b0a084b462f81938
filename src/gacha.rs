//! Gacha
//!
//! 레어도 추첨과 카드 ID 생성

use rand::Rng;

use crate::models::Rarity;

/// 레어도별 확률. 합계 1.0
pub const RARITY_TABLE: [(Rarity, f64); 6] = [
    (Rarity::Star0, 0.50),
    (Rarity::Star1, 0.20),
    (Rarity::Star2, 0.15),
    (Rarity::Star3, 0.10),
    (Rarity::Star4, 0.045),
    (Rarity::Star5, 0.005),
];

/// 누적 확률로 레어도 하나 선택. `roll`은 [0, 1)
pub fn rarity_for_roll(roll: f64) -> Rarity {
    let mut cum = 0.0;
    for (rarity, p) in RARITY_TABLE {
        cum += p;
        if roll <= cum {
            return rarity;
        }
    }
    // 부동소수 누적 오차로 cum이 1.0에 못 미치는 경우
    Rarity::Star5
}

/// n장 분량의 레어도 추첨
pub fn pick_rarities_for_n_cards<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Rarity> {
    (0..n).map(|_| rarity_for_roll(rng.gen::<f64>())).collect()
}

/// 카드 ID: `<밀리초>_<랜덤 8자리 hex>`
pub fn generate_card_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", chrono::Utc::now().timestamp_millis(), &random[..8])
}
