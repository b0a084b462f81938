//! Card Roster
//!
//! 메모리 상의 카드 목록과 보관함(group) 이동.
//! 모든 이동 후에도 카드는 정확히 하나의 group에 속하고,
//! partyId / role은 Party group일 때만 남는다.

use std::collections::HashSet;

use crate::models::{Card, CardGroup};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    cards: Vec<Card>,
}

impl Roster {
    pub fn new(cards: Vec<Card>) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn into_cards(self) -> Vec<Card> {
        self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn by_group(&self, group: CardGroup) -> Vec<&Card> {
        self.cards.iter().filter(|c| c.group == group).collect()
    }

    pub fn party_members(&self, party_id: i64) -> Vec<&Card> {
        self.cards
            .iter()
            .filter(|c| c.group == CardGroup::Party && c.party_id == Some(party_id))
            .collect()
    }

    /// 가챠 결과를 GachaBox에 추가. 이미 있는 id는 건너뛴다. 추가된 수 반환
    pub fn add_gacha_pulls(&mut self, pulls: Vec<Card>) -> usize {
        let mut seen: HashSet<String> = self.cards.iter().map(|c| c.id.clone()).collect();
        let mut added = 0;
        for mut card in pulls {
            if !seen.insert(card.id.clone()) {
                log::warn!("Skipping duplicate card id {}", card.id);
                continue;
            }
            place(&mut card, CardGroup::GachaBox, None, None);
            self.cards.push(card);
            added += 1;
        }
        added
    }

    /// GachaBox 전체를 창고로
    pub fn collect_gacha_box(&mut self) -> usize {
        self.move_where(|c| c.group == CardGroup::GachaBox, CardGroup::Warehouse, None, None)
    }

    pub fn move_to_warehouse(&mut self, ids: &[&str]) -> usize {
        self.move_where(|c| ids.contains(&c.id.as_str()), CardGroup::Warehouse, None, None)
    }

    pub fn assign_to_party(&mut self, ids: &[&str], party_id: i64, role: Option<&str>) -> usize {
        self.move_where(
            |c| ids.contains(&c.id.as_str()),
            CardGroup::Party,
            Some(party_id),
            role,
        )
    }

    pub fn trash(&mut self, ids: &[&str]) -> usize {
        self.move_where(|c| ids.contains(&c.id.as_str()), CardGroup::Trash, None, None)
    }

    /// 휴지통에서 창고로 복원
    pub fn restore_from_trash(&mut self, ids: &[&str]) -> usize {
        self.move_where(
            |c| c.group == CardGroup::Trash && ids.contains(&c.id.as_str()),
            CardGroup::Warehouse,
            None,
            None,
        )
    }

    /// 휴지통 비우기. 제거된 카드 반환
    pub fn empty_trash(&mut self) -> Vec<Card> {
        let (trashed, kept) = std::mem::take(&mut self.cards)
            .into_iter()
            .partition(|c| c.group == CardGroup::Trash);
        self.cards = kept;
        trashed
    }

    /// 파티 삭제 시 소속 카드를 창고로
    pub fn release_party(&mut self, party_id: i64) -> usize {
        self.move_where(
            |c| c.group == CardGroup::Party && c.party_id == Some(party_id),
            CardGroup::Warehouse,
            None,
            None,
        )
    }

    fn move_where(
        &mut self,
        pred: impl Fn(&Card) -> bool,
        group: CardGroup,
        party_id: Option<i64>,
        role: Option<&str>,
    ) -> usize {
        let mut moved = 0;
        for card in self.cards.iter_mut().filter(|c| pred(c)) {
            place(card, group, party_id, role);
            moved += 1;
        }
        moved
    }
}

fn place(card: &mut Card, group: CardGroup, party_id: Option<i64>, role: Option<&str>) {
    card.group = group;
    if group == CardGroup::Party {
        card.party_id = party_id;
        card.role = role.map(str::to_string);
    } else {
        card.party_id = None;
        card.role = None;
    }
}
