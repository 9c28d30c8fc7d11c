use std::sync::Arc;

use armory::catalog::{ItemTemplate, StaticCatalog};
use armory::config::Config;
use armory::engine::{NullEffects, StaticClanDirectory};
use armory::equip::RequirementFailure;
use armory::models::item::{ItemCategory, ItemInstance, ItemSpec};
use armory::models::player::{ClanTreasury, CurrencyKind, PlayerProfile};
use armory::notify::InventoryEvent;
use armory::repo::MemoryRepo;
use armory::{
    ClanId, ContainerKind, DepositOutcome, DestroyOutcome, DomainError, EquipKind,
    InventoryEngine, ItemId, OwnerKey, PlayerId, SessionId, TemplateId, TxOutcome,
};

const RATION: TemplateId = TemplateId(101); // consumable, stacks of 10
const ALLOY: TemplateId = TemplateId(301); // component, stacks of 20
const RIFLE: TemplateId = TemplateId(201); // weapon, no requirements
const VETERAN_RIFLE: TemplateId = TemplateId(202); // weapon, level 5+
const JACKET: TemplateId = TemplateId(401); // armor

fn catalog() -> StaticCatalog {
    let mut cat = StaticCatalog::new();
    cat.insert(ItemTemplate::new(RATION, "ration pack", ItemCategory::Consumable, 10));
    cat.insert(ItemTemplate::new(ALLOY, "scrap alloy", ItemCategory::Component, 20));
    cat.insert(ItemTemplate::new(RIFLE, "trainee rifle", ItemCategory::Weapon, 1));
    let mut veteran = ItemTemplate::new(VETERAN_RIFLE, "veteran rifle", ItemCategory::Weapon, 1);
    veteran.requirements.min_level = Some(5);
    cat.insert(veteran);
    cat.insert(ItemTemplate::new(JACKET, "field jacket", ItemCategory::Armor, 1));
    cat
}

struct Rig {
    engine: InventoryEngine,
    clans: Arc<StaticClanDirectory>,
}

fn rig_over(repo: Arc<MemoryRepo>) -> Rig {
    let config = Config {
        database_url: String::new(),
        sync_lanes: 1,
        sync_queue: 64,
        session_queue: 16,
    };
    let clans = Arc::new(StaticClanDirectory::new());
    let engine = InventoryEngine::new(
        &config,
        repo,
        Arc::new(catalog()),
        clans.clone(),
        Arc::new(NullEffects),
    );
    Rig { engine, clans }
}

fn rig() -> Rig {
    rig_over(Arc::new(MemoryRepo::new()))
}

fn item(id: u64, template: TemplateId, stack: u32) -> ItemInstance {
    ItemInstance {
        id: ItemId(id),
        template,
        stack,
        durability: 100,
        color: 0,
        crafter: None,
        ammo: None,
        acquired_at: chrono::Utc::now(),
    }
}

fn new_clan(rig: &Rig) -> ClanId {
    let clan = ClanId::new();
    rig.engine.install_clan(ClanTreasury::new(clan));
    clan
}

fn member_of(rig: &Rig, clan: ClanId, rank: u8) -> PlayerId {
    let player = PlayerId::new();
    let mut profile = PlayerProfile::new(player);
    profile.clan = Some(clan);
    rig.engine.install_player(profile);
    rig.clans.set_rank(clan, player, rank);
    player
}

fn loner(rig: &Rig) -> PlayerId {
    let player = PlayerId::new();
    rig.engine.install_player(PlayerProfile::new(player));
    player
}

fn slots(rig: &Rig, owner: OwnerKey, kind: ContainerKind) -> Vec<Option<ItemId>> {
    rig.engine.container_slots(owner, kind).unwrap()
}

fn stack_of(rig: &Rig, owner: OwnerKey, item: ItemId) -> u32 {
    rig.engine.item_snapshot(owner, item).unwrap().stack
}

fn units_of(rig: &Rig, owners: &[OwnerKey], template: TemplateId) -> u64 {
    owners
        .iter()
        .map(|owner| {
            rig.engine
                .stack_totals(*owner)
                .unwrap()
                .iter()
                .find(|(t, _)| *t == template)
                .map(|(_, n)| *n)
                .unwrap_or(0)
        })
        .sum()
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<InventoryEvent>) -> Vec<InventoryEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

// ============================================================================
// MOVES
// ============================================================================

#[tokio::test]
async fn swap_between_personal_and_home() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 3, item(1, RATION, 5)).unwrap();
    rig.engine.seed_item(key, ContainerKind::Home, 7, item(2, ALLOY, 4)).unwrap();

    let out = rig
        .engine
        .move_item(p, ContainerKind::Personal, 3, ContainerKind::Home, 7)
        .await
        .unwrap();
    assert_eq!(out, TxOutcome::Committed);
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[3], Some(ItemId(2)));
    assert_eq!(slots(&rig, key, ContainerKind::Home)[7], Some(ItemId(1)));
}

#[tokio::test]
async fn self_move_and_empty_source_are_noops() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 3, item(1, RATION, 5)).unwrap();

    let same = rig
        .engine
        .move_item(p, ContainerKind::Personal, 3, ContainerKind::Personal, 3)
        .await
        .unwrap();
    assert_eq!(same, TxOutcome::NoOp);

    let empty = rig
        .engine
        .move_item(p, ContainerKind::Home, 0, ContainerKind::Personal, 0)
        .await
        .unwrap();
    assert_eq!(empty, TxOutcome::NoOp);

    assert_eq!(slots(&rig, key, ContainerKind::Personal)[3], Some(ItemId(1)));
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[0], None);
}

#[tokio::test]
async fn equipment_containers_reject_plain_moves() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 0, item(1, RIFLE, 1)).unwrap();
    rig.engine.seed_item(key, ContainerKind::WeaponDrawer, 1, item(2, RIFLE, 1)).unwrap();

    let err = rig
        .engine
        .move_item(p, ContainerKind::Personal, 0, ContainerKind::Equipped, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let err = rig
        .engine
        .move_item(p, ContainerKind::Personal, 0, ContainerKind::WeaponDrawer, 3)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let err = rig
        .engine
        .move_item(p, ContainerKind::WeaponDrawer, 1, ContainerKind::Home, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    // Drawer-internal shuffles are allowed, and landing on the active slot
    // raises the mirror.
    let out = rig
        .engine
        .move_item(p, ContainerKind::WeaponDrawer, 1, ContainerKind::WeaponDrawer, 0)
        .await
        .unwrap();
    assert_eq!(out, TxOutcome::Committed);
    assert_eq!(slots(&rig, key, ContainerKind::WeaponDrawer)[0], Some(ItemId(2)));
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], Some(ItemId(2)));

    rig.engine
        .move_item(p, ContainerKind::WeaponDrawer, 0, ContainerKind::WeaponDrawer, 2)
        .await
        .unwrap();
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], None);
}

#[tokio::test]
async fn lockbox_internal_moves_need_a_free_slot() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let key = OwnerKey::Clan(clan);
    rig.engine.seed_item(key, ContainerKind::ClanLockbox, 0, item(1, RATION, 5)).unwrap();
    rig.engine.seed_item(key, ContainerKind::ClanLockbox, 5, item(2, ALLOY, 3)).unwrap();

    let err = rig
        .engine
        .move_item(p, ContainerKind::ClanLockbox, 0, ContainerKind::ClanLockbox, 5)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::SlotOccupied { container: ContainerKind::ClanLockbox, slot: 5 }
    ));

    let out = rig
        .engine
        .move_item(p, ContainerKind::ClanLockbox, 0, ContainerKind::ClanLockbox, 9)
        .await
        .unwrap();
    assert_eq!(out, TxOutcome::Committed);
    let lockbox = slots(&rig, key, ContainerKind::ClanLockbox);
    assert_eq!(lockbox[0], None);
    assert_eq!(lockbox[9], Some(ItemId(1)));
}

// ============================================================================
// LOCKBOX DEPOSIT / WITHDRAW
// ============================================================================

#[tokio::test]
async fn deposit_tops_off_stacks_then_places_remainder() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 2, item(10, RATION, 5)).unwrap();
    rig.engine.seed_item(player_key, ContainerKind::Personal, 100, item(11, RATION, 8)).unwrap();

    let out = rig.engine.deposit_to_lockbox(p, 100).await.unwrap();
    assert_eq!(out, DepositOutcome::Placed { item: ItemId(11), slot: 0 });

    assert_eq!(stack_of(&rig, clan_key, ItemId(10)), 10);
    assert_eq!(stack_of(&rig, clan_key, ItemId(11)), 3);
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[0], Some(ItemId(11)));
    assert_eq!(slots(&rig, player_key, ContainerKind::Personal)[100], None);
    assert!(rig.engine.item_snapshot(player_key, ItemId(11)).is_err());
}

#[tokio::test]
async fn full_lockbox_rolls_back_partial_merges() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 0, item(10, RATION, 9)).unwrap();
    for slot in 1..100 {
        rig.engine
            .seed_item(clan_key, ContainerKind::ClanLockbox, slot, item(500 + slot as u64, ALLOY, 1))
            .unwrap();
    }
    rig.engine.seed_item(player_key, ContainerKind::Personal, 100, item(11, RATION, 8)).unwrap();

    let err = rig.engine.deposit_to_lockbox(p, 100).await.unwrap_err();
    assert!(matches!(err, DomainError::ContainerFull(ContainerKind::ClanLockbox)));

    // The one unit that would have merged must not stick.
    assert_eq!(stack_of(&rig, clan_key, ItemId(10)), 9);
    assert_eq!(stack_of(&rig, player_key, ItemId(11)), 8);
    assert_eq!(slots(&rig, player_key, ContainerKind::Personal)[100], Some(ItemId(11)));
}

#[tokio::test]
async fn deposit_range_follows_purchased_tabs() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let clan_key = OwnerKey::Clan(clan);
    for slot in 0..100 {
        rig.engine
            .seed_item(clan_key, ContainerKind::ClanLockbox, slot, item(500 + slot as u64, ALLOY, 1))
            .unwrap();
    }
    rig.engine
        .seed_item(OwnerKey::Player(p), ContainerKind::Personal, 100, item(11, RATION, 8))
        .unwrap();

    // One purchased tab: slots 100.. exist but are not usable yet.
    let err = rig.engine.deposit_to_lockbox(p, 100).await.unwrap_err();
    assert!(matches!(err, DomainError::ContainerFull(ContainerKind::ClanLockbox)));

    let q = PlayerId::new();
    let mut profile = PlayerProfile::new(q);
    profile.clan = Some(clan);
    profile.lockbox_tabs = 2;
    rig.engine.install_player(profile);
    rig.clans.set_rank(clan, q, 0);
    rig.engine
        .seed_item(OwnerKey::Player(q), ContainerKind::Personal, 100, item(12, RATION, 8))
        .unwrap();

    let out = rig.engine.deposit_to_lockbox(q, 100).await.unwrap();
    assert_eq!(out, DepositOutcome::Placed { item: ItemId(12), slot: 100 });
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[100], Some(ItemId(12)));
}

#[tokio::test]
async fn targeted_deposit_swaps_the_occupant_back() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(player_key, ContainerKind::Personal, 100, item(11, RATION, 8)).unwrap();
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 30, item(20, ALLOY, 5)).unwrap();

    let out = rig
        .engine
        .move_item(p, ContainerKind::Personal, 100, ContainerKind::ClanLockbox, 30)
        .await
        .unwrap();
    assert_eq!(out, TxOutcome::Committed);

    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[30], Some(ItemId(11)));
    assert_eq!(slots(&rig, player_key, ContainerKind::Personal)[100], Some(ItemId(20)));
    assert_eq!(stack_of(&rig, clan_key, ItemId(11)), 8);
    assert_eq!(stack_of(&rig, player_key, ItemId(20)), 5);
}

#[tokio::test]
async fn withdrawals_need_officer_rank() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 1);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 3, item(10, RATION, 5)).unwrap();

    let err = rig.engine.withdraw_from_lockbox(p, 3, None).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientPermission));

    // The plain-move route out of the lockbox is gated the same way.
    let err = rig
        .engine
        .move_item(p, ContainerKind::ClanLockbox, 3, ContainerKind::Personal, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InsufficientPermission));
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[3], Some(ItemId(10)));

    rig.clans.set_rank(clan, p, 2);
    let out = rig.engine.withdraw_from_lockbox(p, 3, None).await.unwrap();
    assert_eq!(out, DepositOutcome::Placed { item: ItemId(10), slot: 100 });
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[3], None);
    assert_eq!(slots(&rig, player_key, ContainerKind::Personal)[100], Some(ItemId(10)));
}

#[tokio::test]
async fn withdrawal_merges_into_the_category_band() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 2);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(player_key, ContainerKind::Personal, 120, item(30, RATION, 8)).unwrap();
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 4, item(31, RATION, 2)).unwrap();

    let out = rig.engine.withdraw_from_lockbox(p, 4, None).await.unwrap();
    assert_eq!(out, DepositOutcome::Merged { into: ItemId(30) });

    assert_eq!(stack_of(&rig, player_key, ItemId(30)), 10);
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[4], None);
    assert!(rig.engine.item_snapshot(clan_key, ItemId(31)).is_err());
}

#[tokio::test]
async fn targeted_withdrawal_swaps_back() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 2);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 6, item(32, RATION, 4)).unwrap();
    rig.engine.seed_item(player_key, ContainerKind::Personal, 110, item(33, ALLOY, 2)).unwrap();

    let out = rig.engine.withdraw_from_lockbox(p, 6, Some(110)).await.unwrap();
    assert_eq!(out, DepositOutcome::Placed { item: ItemId(32), slot: 110 });

    assert_eq!(slots(&rig, player_key, ContainerKind::Personal)[110], Some(ItemId(32)));
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[6], Some(ItemId(33)));
    assert_eq!(stack_of(&rig, player_key, ItemId(32)), 4);
    assert_eq!(stack_of(&rig, clan_key, ItemId(33)), 2);
}

// ============================================================================
// EQUIP
// ============================================================================

#[tokio::test]
async fn equip_rejects_unmet_requirements() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 0, item(34, VETERAN_RIFLE, 1)).unwrap();
    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(35, RATION, 5)).unwrap();

    let err = rig.engine.equip(p, 0, 1, EquipKind::Weapon).await.unwrap_err();
    match err {
        DomainError::RequirementNotMet(failures) => {
            assert!(matches!(
                failures[0],
                RequirementFailure::LevelTooLow { required: 5, actual: 1 }
            ));
        }
        other => panic!("expected a requirement failure, got {other:?}"),
    }
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[0], Some(ItemId(34)));
    assert!(slots(&rig, key, ContainerKind::WeaponDrawer).iter().all(|s| s.is_none()));

    // Non-weapons never reach the drawer regardless of requirements.
    let err = rig.engine.equip(p, 100, 1, EquipKind::Weapon).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
}

#[tokio::test]
async fn weapon_equips_mirror_the_active_slot() {
    let rig = rig();
    let p = PlayerId::new();
    let mut profile = PlayerProfile::new(p);
    profile.weapon_ready = true;
    rig.engine.install_player(profile);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 0, item(36, RIFLE, 1)).unwrap();

    let out = rig.engine.equip(p, 0, 0, EquipKind::Weapon).await.unwrap();
    assert_eq!(out, TxOutcome::Committed);
    assert_eq!(slots(&rig, key, ContainerKind::WeaponDrawer)[0], Some(ItemId(36)));
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], Some(ItemId(36)));
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[0], None);
    assert!(rig.engine.player_snapshot(p).unwrap().weapon_ready);

    // Pulling the active weapon back out clears the mirror and lowers it.
    rig.engine.equip(p, 5, 0, EquipKind::Weapon).await.unwrap();
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[5], Some(ItemId(36)));
    assert_eq!(slots(&rig, key, ContainerKind::WeaponDrawer)[0], None);
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], None);
    assert!(!rig.engine.player_snapshot(p).unwrap().weapon_ready);
}

#[tokio::test]
async fn armor_equips_swap_in_place() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 50, item(37, JACKET, 1)).unwrap();
    rig.engine.seed_item(key, ContainerKind::Equipped, 5, item(38, JACKET, 1)).unwrap();

    let out = rig.engine.equip(p, 50, 5, EquipKind::Armor).await.unwrap();
    assert_eq!(out, TxOutcome::Committed);
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[5], Some(ItemId(37)));
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[50], Some(ItemId(38)));

    let err = rig.engine.equip(p, 50, 13, EquipKind::Armor).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
}

// ============================================================================
// SPLIT
// ============================================================================

#[tokio::test]
async fn splitting_carves_a_new_instance() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(39, RATION, 7)).unwrap();

    let new_id = rig.engine.split_stack(p, ContainerKind::Personal, 100, 101, 3).await.unwrap();
    assert_ne!(new_id, ItemId(39));
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[101], Some(new_id));
    assert_eq!(stack_of(&rig, key, ItemId(39)), 4);
    assert_eq!(stack_of(&rig, key, new_id), 3);
    assert_eq!(rig.engine.item_snapshot(key, new_id).unwrap().template, RATION);
}

#[tokio::test]
async fn split_rejects_bad_targets() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(1, RATION, 7)).unwrap();
    rig.engine.seed_item(key, ContainerKind::Personal, 101, item(2, RATION, 1)).unwrap();

    let err = rig.engine.split_stack(p, ContainerKind::Personal, 100, 102, 0).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    // Taking the whole stack is a move, not a split.
    let err = rig.engine.split_stack(p, ContainerKind::Personal, 100, 102, 7).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let err = rig.engine.split_stack(p, ContainerKind::Personal, 100, 101, 3).await.unwrap_err();
    assert!(matches!(err, DomainError::SlotOccupied { .. }));

    let err = rig.engine.split_stack(p, ContainerKind::ClanLockbox, 0, 1, 3).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let err = rig.engine.split_stack(p, ContainerKind::Personal, 120, 121, 1).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    assert_eq!(stack_of(&rig, key, ItemId(1)), 7);
}

// ============================================================================
// DESTROY
// ============================================================================

#[tokio::test]
async fn destroy_reduces_then_frees() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(40, RATION, 10)).unwrap();

    let out = rig.engine.destroy_item(p, key, ItemId(40), 4).await.unwrap();
    assert_eq!(out, DestroyOutcome::Reduced { remaining: 6 });
    assert_eq!(stack_of(&rig, key, ItemId(40)), 6);

    // Overshooting destroys outright.
    let out = rig.engine.destroy_item(p, key, ItemId(40), 99).await.unwrap();
    assert_eq!(out, DestroyOutcome::Destroyed);
    assert_eq!(slots(&rig, key, ContainerKind::Personal)[100], None);
    assert!(rig.engine.item_snapshot(key, ItemId(40)).is_err());
}

#[tokio::test]
async fn destroy_checks_ownership() {
    let rig = rig();
    let p = loner(&rig);
    let q = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(40, RATION, 10)).unwrap();

    let err = rig.engine.destroy_item(p, key, ItemId(40), 0).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let err = rig.engine.destroy_item(q, key, ItemId(40), 1).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientPermission));

    let err = rig.engine.destroy_item(p, key, ItemId(9999), 1).await.unwrap_err();
    assert!(matches!(err, DomainError::NotOwner { item: ItemId(9999), .. }));

    assert_eq!(stack_of(&rig, key, ItemId(40)), 10);
}

#[tokio::test]
async fn lockbox_stacks_destroy_whole_or_not_at_all() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 0, item(50, RATION, 8)).unwrap();

    let err = rig.engine.destroy_item(p, clan_key, ItemId(50), 3).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    assert_eq!(stack_of(&rig, clan_key, ItemId(50)), 8);

    // A member of some other clan has no say here.
    let rival = member_of(&rig, ClanId::new(), 4);
    let err = rig.engine.destroy_item(rival, clan_key, ItemId(50), 8).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientPermission));

    let out = rig.engine.destroy_item(p, clan_key, ItemId(50), 8).await.unwrap();
    assert_eq!(out, DestroyOutcome::Destroyed);
    assert_eq!(slots(&rig, clan_key, ContainerKind::ClanLockbox)[0], None);
}

#[tokio::test]
async fn destroying_the_active_weapon_clears_the_mirror() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);
    rig.engine.seed_item(key, ContainerKind::Personal, 0, item(36, RIFLE, 1)).unwrap();
    rig.engine.equip(p, 0, 0, EquipKind::Weapon).await.unwrap();
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], Some(ItemId(36)));

    let out = rig.engine.destroy_item(p, key, ItemId(36), 1).await.unwrap();
    assert_eq!(out, DestroyOutcome::Destroyed);
    assert_eq!(slots(&rig, key, ContainerKind::WeaponDrawer)[0], None);
    assert_eq!(slots(&rig, key, ContainerKind::Equipped)[13], None);
}

// ============================================================================
// CURRENCY
// ============================================================================

#[tokio::test]
async fn lockbox_credit_transfers_enforce_the_minimum() {
    let rig = rig();
    let p = PlayerId::new();
    let mut profile = PlayerProfile::new(p);
    profile.credits = 10_000;
    rig.engine.install_player(profile);

    let err = rig.engine.transfer_lockbox_credits(p, 499).await.unwrap_err();
    assert!(matches!(err, DomainError::BelowMinimum { amount: 499, minimum: 500 }));
    let err = rig.engine.transfer_lockbox_credits(p, -499).await.unwrap_err();
    assert!(matches!(err, DomainError::BelowMinimum { amount: -499, minimum: 500 }));

    assert_eq!(rig.engine.transfer_lockbox_credits(p, 600).await.unwrap(), 600);
    assert_eq!(rig.engine.transfer_lockbox_credits(p, -500).await.unwrap(), 100);

    let err = rig.engine.transfer_lockbox_credits(p, -5_000).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { have: 100, need: 5_000 }));
    let err = rig.engine.transfer_lockbox_credits(p, 100_000).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { have: 9_900, .. }));

    let profile = rig.engine.player_snapshot(p).unwrap();
    assert_eq!(profile.credits, 9_900);
    assert_eq!(profile.lockbox_credits, 100);
}

#[tokio::test]
async fn clan_treasury_never_goes_negative() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = PlayerId::new();
    let mut profile = PlayerProfile::new(p);
    profile.clan = Some(clan);
    profile.credits = 5_000;
    profile.prestige = 2_000;
    rig.engine.install_player(profile);
    rig.clans.set_rank(clan, p, 0);

    rig.engine.transfer_clan_credits(p, 2_000, CurrencyKind::Credits).await.unwrap();
    rig.engine.transfer_clan_credits(p, -500, CurrencyKind::Credits).await.unwrap();

    let err = rig.engine.transfer_clan_credits(p, -5_000, CurrencyKind::Credits).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { have: 1_500, need: 5_000 }));

    let err = rig.engine.transfer_clan_credits(p, 300, CurrencyKind::Credits).await.unwrap_err();
    assert!(matches!(err, DomainError::BelowMinimum { amount: 300, minimum: 500 }));

    rig.engine.transfer_clan_credits(p, 1_000, CurrencyKind::Prestige).await.unwrap();

    let treasury = rig.engine.treasury_snapshot(clan).unwrap();
    assert_eq!(treasury.credits, 1_500);
    assert_eq!(treasury.prestige, 1_000);
    let profile = rig.engine.player_snapshot(p).unwrap();
    assert_eq!(profile.credits, 3_500);
    assert_eq!(profile.prestige, 1_000);

    let outsider = loner(&rig);
    assert!(rig.engine.transfer_clan_credits(outsider, 1_000, CurrencyKind::Credits).await.is_err());
}

#[tokio::test]
async fn lockbox_tabs_unlock_in_order() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = PlayerId::new();
    let mut profile = PlayerProfile::new(p);
    profile.clan = Some(clan);
    profile.credits = 150_000;
    rig.engine.install_player(profile);
    rig.clans.set_rank(clan, p, 0);

    let err = rig.engine.purchase_lockbox_tab(p, 3).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    assert_eq!(rig.engine.purchase_lockbox_tab(p, 2).await.unwrap(), 2);
    let profile = rig.engine.player_snapshot(p).unwrap();
    assert_eq!(profile.lockbox_tabs, 2);
    assert_eq!(profile.credits, 50_000);

    let err = rig.engine.purchase_lockbox_tab(p, 3).await.unwrap_err();
    assert!(matches!(err, DomainError::InsufficientFunds { have: 50_000, need: 1_000_000 }));

    let err = rig.engine.purchase_lockbox_tab(p, 6).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    let err = rig.engine.purchase_lockbox_tab(p, 1).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    let outsider = loner(&rig);
    assert!(rig.engine.purchase_lockbox_tab(outsider, 2).await.is_err());
}

// ============================================================================
// GRANTS
// ============================================================================

#[tokio::test]
async fn grants_merge_and_respect_limits() {
    let rig = rig();
    let p = loner(&rig);
    let key = OwnerKey::Player(p);

    let err = rig.engine.grant_item(p, ItemSpec::new(RATION, 0)).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    let err = rig.engine.grant_item(p, ItemSpec::new(RATION, 25)).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));
    let err = rig.engine.grant_item(p, ItemSpec::new(TemplateId(999), 1)).await.unwrap_err();
    assert!(matches!(err, DomainError::PreconditionFailed(_)));

    rig.engine.seed_item(key, ContainerKind::Personal, 100, item(60, RATION, 7)).unwrap();
    let out = rig.engine.grant_item(p, ItemSpec::new(RATION, 10)).await.unwrap();
    let DepositOutcome::Placed { item: minted, slot } = out else {
        panic!("expected a placement, got {out:?}");
    };
    assert_eq!(slot, 101);
    assert_eq!(stack_of(&rig, key, ItemId(60)), 10);
    assert_eq!(stack_of(&rig, key, minted), 7);

    rig.engine.seed_item(key, ContainerKind::Personal, 150, item(200, ALLOY, 15)).unwrap();
    let out = rig.engine.grant_item(p, ItemSpec::new(ALLOY, 5)).await.unwrap();
    assert_eq!(out, DepositOutcome::Merged { into: ItemId(200) });
    assert_eq!(stack_of(&rig, key, ItemId(200)), 20);
}

// ============================================================================
// CROSS-CUTTING
// ============================================================================

#[tokio::test]
async fn units_are_conserved_across_transfers() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 2);
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    rig.engine.seed_item(player_key, ContainerKind::Personal, 100, item(70, RATION, 8)).unwrap();
    rig.engine.seed_item(player_key, ContainerKind::Personal, 150, item(71, ALLOY, 20)).unwrap();
    rig.engine.seed_item(clan_key, ContainerKind::ClanLockbox, 0, item(72, RATION, 5)).unwrap();

    let owners = [player_key, clan_key];
    assert_eq!(units_of(&rig, &owners, RATION), 13);
    assert_eq!(units_of(&rig, &owners, ALLOY), 20);

    rig.engine.deposit_to_lockbox(p, 100).await.unwrap();
    rig.engine.withdraw_from_lockbox(p, 1, None).await.unwrap();
    rig.engine.move_item(p, ContainerKind::Personal, 150, ContainerKind::Home, 10).await.unwrap();
    rig.engine.split_stack(p, ContainerKind::Home, 10, 11, 6).await.unwrap();

    assert_eq!(units_of(&rig, &owners, RATION), 13);
    assert_eq!(units_of(&rig, &owners, ALLOY), 20);

    // Destruction is the only sink.
    rig.engine.destroy_item(p, player_key, ItemId(70), 2).await.unwrap();
    assert_eq!(units_of(&rig, &owners, RATION), 11);
}

#[tokio::test]
async fn sessions_hear_their_audience() {
    let rig = rig();
    let clan = new_clan(&rig);
    let p = member_of(&rig, clan, 0);
    let q = member_of(&rig, clan, 0);
    let z = loner(&rig);
    let mut rx_p = rig.engine.attach_session(SessionId::new(), p, Some(clan));
    let mut rx_q = rig.engine.attach_session(SessionId::new(), q, Some(clan));
    let mut rx_z = rig.engine.attach_session(SessionId::new(), z, None);

    rig.engine
        .seed_item(OwnerKey::Player(p), ContainerKind::Personal, 100, item(11, RATION, 8))
        .unwrap();
    rig.engine.deposit_to_lockbox(p, 100).await.unwrap();
    rig.engine.lockbox_tab_permissions(p).unwrap();

    let seen_p = drain(&mut rx_p);
    assert!(seen_p.iter().any(|e| matches!(
        e,
        InventoryEvent::SlotUnbound { container, slot: 100, .. }
            if container.kind == ContainerKind::Personal
    )));
    assert!(seen_p.iter().any(|e| matches!(e, InventoryEvent::TabPermissions { tabs: 1, .. })));

    // The second member sees the lockbox side only.
    let seen_q = drain(&mut rx_q);
    assert!(seen_q.iter().any(|e| matches!(
        e,
        InventoryEvent::SlotBound { container, slot: 0, .. }
            if container.kind == ContainerKind::ClanLockbox
    )));
    assert!(!seen_q.iter().any(|e| matches!(e, InventoryEvent::SlotUnbound { .. })));

    assert!(drain(&mut rx_z).is_empty());
}

#[tokio::test]
async fn committed_writes_survive_a_reload() {
    let repo = Arc::new(MemoryRepo::new());
    let clan = ClanId::new();
    let p = PlayerId::new();
    let player_key = OwnerKey::Player(p);
    let clan_key = OwnerKey::Clan(clan);
    let mut profile = PlayerProfile::new(p);
    profile.clan = Some(clan);

    repo.seed_item(item(80, RATION, 8));
    repo.seed_binding(player_key, ContainerKind::Personal, 100, ItemId(80));
    repo.seed_item(item(81, RATION, 5));
    repo.seed_binding(clan_key, ContainerKind::ClanLockbox, 2, ItemId(81));

    let Rig { engine, .. } = rig_over(repo.clone());
    engine.load_player(profile.clone()).await.unwrap();
    engine.load_clan(ClanTreasury::new(clan)).await.unwrap();

    engine.deposit_to_lockbox(p, 100).await.unwrap();
    let granted = match engine.grant_item(p, ItemSpec::new(ALLOY, 5)).await.unwrap() {
        DepositOutcome::Placed { item, slot } => {
            assert_eq!(slot, 150);
            item
        }
        other => panic!("expected a placement, got {other:?}"),
    };
    engine.shutdown().await;

    // Every durable write made it through the lanes.
    assert_eq!(repo.binding(clan_key, ContainerKind::ClanLockbox, 0), Some(ItemId(80)));
    assert_eq!(repo.binding(player_key, ContainerKind::Personal, 100), None);
    assert_eq!(repo.binding(player_key, ContainerKind::Personal, 150), Some(granted));
    assert_eq!(repo.stored_stack(ItemId(80)), Some(3));
    assert_eq!(repo.stored_stack(ItemId(81)), Some(10));

    let fresh = rig_over(repo.clone());
    fresh.engine.load_player(profile).await.unwrap();
    fresh.engine.load_clan(ClanTreasury::new(clan)).await.unwrap();

    assert_eq!(slots(&fresh, player_key, ContainerKind::Personal)[100], None);
    assert_eq!(slots(&fresh, player_key, ContainerKind::Personal)[150], Some(granted));
    let lockbox = slots(&fresh, clan_key, ContainerKind::ClanLockbox);
    assert_eq!(lockbox[0], Some(ItemId(80)));
    assert_eq!(lockbox[2], Some(ItemId(81)));
    assert_eq!(stack_of(&fresh, clan_key, ItemId(80)), 3);
    assert_eq!(stack_of(&fresh, clan_key, ItemId(81)), 10);
    assert_eq!(stack_of(&fresh, player_key, granted), 5);
}
