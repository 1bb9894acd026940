use alloy_sol_types::sol;

sol! {
    /// Surface every deployed revision exposes.
    interface SocialDApp {
        function isUserRegistered(address user) external view returns (bool registered);
        function getUserInfo(address user) external view returns (string username, uint256 postCount);
        function registerUser(string name) external;
        function createPost(string content) external;
        function editPost(uint256 postId, string content) external;
        function getAllPosts() external view returns (uint256[] ids, address[] authors, string[] contents, uint256[] timestamps);
        function getPlatformStats() external view returns (uint256 usersCount, uint256 postsCount);
        function giveTipping(uint256 postId) external payable;
        function getPostTipping(uint256 postId) external view returns (uint256 totalTipping);
        function getUserTipping(address user) external view returns (uint256 totalTipping);
    }

    /// Revision that stores a pinned media reference next to each post.
    interface SocialDAppMedia {
        function createPost(string content, string mediaHash, string mediaType) external;
        function getAllPosts() external view returns (uint256[] ids, address[] authors, string[] contents, string[] mediaHashes, string[] mediaTypes, uint256[] timestamps);
    }

    /// Revision with a withdrawable tip ledger.
    interface SocialDAppWithdrawal {
        function getUserTipping(address user) external view returns (uint256 totalTipping, uint256 withdrawnTipping, uint256 availableTipping);
        function withdrawTipping() external;
    }
}
